use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{error, Level};

use opensearch_log_sink::init::{init_tracing_with_config, LayerConfig};
use opensearch_log_sink::noop::NoopClient;
use opensearch_log_sink::{HandlerConfig, LogRecord, OpenSearchHandler, RotationPolicy};

#[tokio::main]
async fn main() {
    let config = HandlerConfig {
        rotation: RotationPolicy::Hourly,
        date_format: "%Y.%m.%d.%H".to_string(),
        buffer_size: 5_000,
        flush_interval: Duration::from_millis(200),
        ..HandlerConfig::new("load-logs")
    };
    let handler = Arc::new(OpenSearchHandler::new(config, Arc::new(NoopClient)).expect("valid config"));

    let layer_config = LayerConfig {
        max_level: Level::ERROR,
        enable_stdout: false,
    };
    init_tracing_with_config(Arc::clone(&handler), layer_config).expect("set global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("layer: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Same volume through `emit`, which pays for full-buffer flushes itself.
    let start = Instant::now();
    for i in 0..n {
        let record = LogRecord::new("ERROR", "custom_load").with_field("iteration", i);
        handler.emit(&record).await.expect("noop client never fails");
    }
    let elapsed = start.elapsed();
    println!("emit: sent {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    handler.close().await.expect("final flush");
    println!("{:?}", handler.stats());
}
