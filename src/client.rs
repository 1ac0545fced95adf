use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{ClientError, ConfigError};

/// Bulk action used for every document of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    Index,
    /// Required by data streams, which only accept appends.
    Create,
}

impl BulkOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkOp::Index => "index",
            BulkOp::Create => "create",
        }
    }
}

/// Per-document result of a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    Rejected { reason: String },
}

/// Asynchronous destination for batches of [`Document`]s.
///
/// Implementations own the connection to a concrete store. The handler
/// serializes flushes, so at most one `bulk_write` per handler is in
/// flight at a time.
#[async_trait]
pub trait DocumentStoreClient: Send + Sync {
    /// Write `docs` to `index` in a single request.
    ///
    /// **Returns**
    /// - `Ok(outcomes)` with one [`WriteOutcome`] per document, in the
    ///   order of `docs`, when the store answered the request.
    /// - `Err(..)` when the request as a whole failed (connection error,
    ///   HTTP status, undecodable response). No document of the batch
    ///   should be assumed written.
    async fn bulk_write(
        &self,
        index: &str,
        op: BulkOp,
        docs: &[Document],
    ) -> Result<Vec<WriteOutcome>, ClientError>;

    /// Check that the store is reachable. Default implementation reports
    /// success without any I/O.
    async fn ping(&self) -> Result<bool, ClientError> {
        Ok(true)
    }

    /// Release connections. Called once, after the final flush.
    async fn close(&self) {}
}

/// Connection settings handed verbatim to a client constructor.
///
/// The handler never interprets these values; it only insists that some
/// were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionParams(Map<String, Value>);

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ensure_present(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            Err(ConfigError::MissingConnectionParams)
        } else {
            Ok(())
        }
    }
}

impl From<Map<String, Value>> for ConnectionParams {
    fn from(map: Map<String, Value>) -> Self {
        ConnectionParams(map)
    }
}
