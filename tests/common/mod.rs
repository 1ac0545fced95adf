#![allow(dead_code)]

use async_trait::async_trait;
use opensearch_log_sink::{BulkOp, ClientError, Document, DocumentStoreClient, WriteOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One recorded bulk request.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: String,
    pub op: BulkOp,
    pub docs: Vec<Document>,
}

/// Client that keeps every batch it receives in memory.
#[derive(Default)]
pub struct RecordingClient {
    pub batches: Mutex<Vec<Batch>>,
    pub reject_all: bool,
    pub fail: bool,
    pub closed: AtomicBool,
}

impl RecordingClient {
    pub fn rejecting() -> Self {
        Self { reject_all: true, ..Self::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.batches().into_iter().flat_map(|b| b.docs).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStoreClient for RecordingClient {
    async fn bulk_write(
        &self,
        index: &str,
        op: BulkOp,
        docs: &[Document],
    ) -> Result<Vec<WriteOutcome>, ClientError> {
        if self.fail {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        self.batches.lock().unwrap().push(Batch {
            index: index.to_string(),
            op,
            docs: docs.to_vec(),
        });
        let outcome = if self.reject_all {
            WriteOutcome::Rejected { reason: "index_closed_exception: closed".to_string() }
        } else {
            WriteOutcome::Accepted
        };
        Ok(vec![outcome; docs.len()])
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
