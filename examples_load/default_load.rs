use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use opensearch_log_sink::init::init_tracing;
use opensearch_log_sink::noop::NoopClient;
use opensearch_log_sink::{HandlerConfig, OpenSearchHandler};

#[tokio::main]
async fn main() {
    let handler = Arc::new(
        OpenSearchHandler::new(HandlerConfig::default(), Arc::new(NoopClient)).expect("valid config"),
    );
    init_tracing(Arc::clone(&handler)).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    handler.close().await.expect("final flush");
    println!("{:?}", handler.stats());
}
