use crate::client::{BulkOp, DocumentStoreClient, WriteOutcome};
use crate::document::Document;
use crate::error::ClientError;
use async_trait::async_trait;

/// A client that accepts and discards every document.
///
/// Useful for measuring the overhead of the handler itself without any
/// external I/O, and for tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopClient;

#[async_trait]
impl DocumentStoreClient for NoopClient {
    async fn bulk_write(
        &self,
        _index: &str,
        _op: BulkOp,
        docs: &[Document],
    ) -> Result<Vec<WriteOutcome>, ClientError> {
        Ok(vec![WriteOutcome::Accepted; docs.len()])
    }
}
