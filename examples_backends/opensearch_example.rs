use std::sync::Arc;

use tracing::{error, info};
use opensearch_log_sink::{
    init::init_tracing,
    ConnectionParams, HandlerConfig, OpenSearchHandler,
};

#[tokio::main]
async fn main() {
    // Example: LOG_SINK_OPENSEARCH_HOSTS=https://localhost:9200
    //          LOG_SINK_OPENSEARCH_USER=admin LOG_SINK_OPENSEARCH_PASSWORD=admin
    let mut params = ConnectionParams::from_env();
    if params.is_empty() {
        params = ConnectionParams::new().with("hosts", "http://localhost:9200");
    }
    let config = HandlerConfig::from_env().expect("invalid LOG_SINK_* configuration");

    let handler = Arc::new(
        OpenSearchHandler::connect(config, params).expect("failed to build opensearch handler"),
    );
    match handler.ping().await {
        Ok(true) => {}
        Ok(false) | Err(_) => eprintln!("opensearch is not reachable, records will be dropped"),
    }

    init_tracing(Arc::clone(&handler)).expect("set global subscriber");

    info!("opensearch backend example started");
    error!(topic = "dev", "simulated error sent via OpenSearch backend");

    if let Err(e) = handler.close().await {
        eprintln!("final flush failed: {}", e);
    }
}
