use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use opensearch_log_sink::{
    init::init_tracing,
    BulkOp, ClientError, Document, DocumentStoreClient, HandlerConfig, OpenSearchHandler,
    WriteOutcome,
};

/// Example of integrating a completely custom store by implementing
/// the `DocumentStoreClient` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide a built-in
/// client.
struct MyCustomDbClient;

#[async_trait]
impl DocumentStoreClient for MyCustomDbClient {
    async fn bulk_write(
        &self,
        index: &str,
        _op: BulkOp,
        docs: &[Document],
    ) -> Result<Vec<WriteOutcome>, ClientError> {
        // Here you would call your own client library for the target DB.
        // For the sake of example we just print the documents.
        for doc in docs {
            println!("[my-custom-db/{}] {}", index, doc.clone().into_value());
        }
        Ok(vec![WriteOutcome::Accepted; docs.len()])
    }
}

#[tokio::main]
async fn main() {
    let handler = Arc::new(
        OpenSearchHandler::new(HandlerConfig::new("custom-logs"), Arc::new(MyCustomDbClient))
            .expect("valid config"),
    );

    init_tracing(Arc::clone(&handler)).expect("set global subscriber");

    info!("custom backend example started");
    error!(db = "my-custom-db", "simulated error sent via custom backend");

    handler.close().await.expect("final flush");
}
