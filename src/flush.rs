use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::client::{BulkOp, DocumentStoreClient, WriteOutcome};
use crate::error::FlushError;
use crate::index::{resolve_index_name, DateFormat, RotationPolicy};

/// Where and how a flush writes.
#[derive(Debug, Clone)]
pub struct FlushTarget {
    pub index_name: String,
    pub rotation: RotationPolicy,
    pub date_format: DateFormat,
    pub separator: String,
}

impl FlushTarget {
    pub fn resolve(&self, as_of: DateTime<Utc>) -> String {
        resolve_index_name(&self.index_name, self.rotation, as_of, &self.date_format, &self.separator)
    }

    fn op(&self) -> BulkOp {
        if self.rotation == RotationPolicy::DataStream {
            BulkOp::Create
        } else {
            BulkOp::Index
        }
    }
}

/// Result of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Index the batch went to; `None` when there was nothing to flush.
    pub index: Option<String>,
    pub submitted: usize,
    pub rejected: usize,
}

/// Counters shared by the handler, its scheduler and its layer.
#[derive(Debug, Default)]
pub struct Stats {
    pub(crate) emitted: AtomicU64,
    pub(crate) submitted: AtomicU64,
    pub(crate) accepted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) lost: AtomicU64,
    pub(crate) failed_flushes: AtomicU64,
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    /// Records accepted into the buffer.
    pub emitted: u64,
    /// Documents sent in bulk requests.
    pub submitted: u64,
    pub accepted: u64,
    /// Documents the store refused.
    pub rejected: u64,
    /// Documents lost because their whole bulk request failed.
    pub lost: u64,
    pub failed_flushes: u64,
}

impl Stats {
    pub fn snapshot(&self) -> HandlerStats {
        HandlerStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}

/// Drains the buffer and submits its content as one bulk request.
///
/// Flushes are single flight: [`FlushExecutor::flush`] waits for a running
/// flush to finish, [`FlushExecutor::try_flush`] gives up instead.
pub struct FlushExecutor {
    buffer: Arc<Buffer>,
    client: Arc<dyn DocumentStoreClient>,
    target: FlushTarget,
    raise_on_submit_error: bool,
    in_flight: Mutex<()>,
    stats: Arc<Stats>,
}

impl FlushExecutor {
    pub fn new(
        buffer: Arc<Buffer>,
        client: Arc<dyn DocumentStoreClient>,
        target: FlushTarget,
        raise_on_submit_error: bool,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            buffer,
            client,
            target,
            raise_on_submit_error,
            in_flight: Mutex::new(()),
            stats,
        }
    }

    /// Flush everything buffered, resolving the index from the current time.
    pub async fn flush(&self) -> Result<FlushReport, FlushError> {
        let _guard = self.in_flight.lock().await;
        self.run(Utc::now()).await
    }

    /// Flush as if the current time were `as_of`.
    pub async fn flush_as_of(&self, as_of: DateTime<Utc>) -> Result<FlushReport, FlushError> {
        let _guard = self.in_flight.lock().await;
        self.run(as_of).await
    }

    /// Flush unless another flush is already running, in which case
    /// `None` is returned without touching the buffer.
    pub async fn try_flush(&self) -> Option<Result<FlushReport, FlushError>> {
        let _guard = self.in_flight.try_lock().ok()?;
        Some(self.run(Utc::now()).await)
    }

    pub fn client(&self) -> &Arc<dyn DocumentStoreClient> {
        &self.client
    }

    async fn run(&self, as_of: DateTime<Utc>) -> Result<FlushReport, FlushError> {
        let docs = self.buffer.drain();
        if docs.is_empty() {
            return Ok(FlushReport::default());
        }

        let index = self.target.resolve(as_of);
        let total = docs.len();
        self.stats.submitted.fetch_add(total as u64, Ordering::Relaxed);

        let outcomes = match self.client.bulk_write(&index, self.target.op(), &docs).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.stats.lost.fetch_add(total as u64, Ordering::Relaxed);
                self.stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
                if self.raise_on_submit_error {
                    return Err(e.into());
                }
                warn!(index = %index, documents = total, error = %e, "bulk request failed, dropping batch");
                return Ok(FlushReport { index: Some(index), submitted: total, rejected: 0 });
            }
        };

        let mut rejected = 0;
        let mut first_reason = None;
        // Outcomes past the end of the batch are ignored.
        for outcome in outcomes.iter().take(total) {
            if let WriteOutcome::Rejected { reason } = outcome {
                rejected += 1;
                first_reason.get_or_insert_with(|| reason.clone());
            }
        }
        // Documents the store did not report on are counted as rejected.
        if outcomes.len() < total {
            rejected += total - outcomes.len();
            first_reason.get_or_insert_with(|| "missing from bulk response".to_string());
        }

        let accepted = total - rejected;
        self.stats.accepted.fetch_add(accepted as u64, Ordering::Relaxed);
        self.stats.rejected.fetch_add(rejected as u64, Ordering::Relaxed);
        debug!(index = %index, accepted, rejected, "bulk write completed");

        if rejected > 0 {
            self.stats.failed_flushes.fetch_add(1, Ordering::Relaxed);
            let reason = first_reason.unwrap_or_default();
            if self.raise_on_submit_error {
                return Err(FlushError::Rejected { rejected, total, reason });
            }
            warn!(index = %index, rejected, total, reason = %reason, "documents rejected by the store");
        }

        Ok(FlushReport { index: Some(index), submitted: total, rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::{json, Map};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        calls: StdMutex<Vec<(String, BulkOp, usize)>>,
        reject_every: Option<usize>,
        /// Rejections reported beyond the end of the batch.
        surplus: usize,
        fail: bool,
    }

    #[async_trait]
    impl DocumentStoreClient for Recorder {
        async fn bulk_write(
            &self,
            index: &str,
            op: BulkOp,
            docs: &[Document],
        ) -> Result<Vec<WriteOutcome>, ClientError> {
            self.calls.lock().unwrap().push((index.to_string(), op, docs.len()));
            if self.fail {
                return Err(ClientError::Transport("connection refused".to_string()));
            }
            let surplus = (0..self.surplus).map(|_| WriteOutcome::Rejected { reason: "phantom".to_string() });
            Ok((0..docs.len())
                .map(|i| match self.reject_every {
                    Some(n) if i % n == 0 => WriteOutcome::Rejected { reason: "mapper_parsing_exception".to_string() },
                    _ => WriteOutcome::Accepted,
                })
                .chain(surplus)
                .collect())
        }
    }

    fn doc() -> Document {
        let mut map = Map::new();
        map.insert("message".to_string(), json!("hello"));
        Document::from(map)
    }

    fn executor(client: Arc<Recorder>, rotation: RotationPolicy, raise: bool) -> (Arc<Buffer>, FlushExecutor) {
        let buffer = Arc::new(Buffer::new(10));
        let target = FlushTarget {
            index_name: "python-logs".to_string(),
            rotation,
            date_format: DateFormat::default(),
            separator: "-".to_string(),
        };
        let exec = FlushExecutor::new(Arc::clone(&buffer), client, target, raise, Arc::new(Stats::default()));
        (buffer, exec)
    }

    #[tokio::test]
    async fn empty_buffer_makes_no_request() {
        let client = Arc::new(Recorder::default());
        let (_buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Daily, true);

        let report = exec.flush().await.unwrap();
        assert_eq!(report, FlushReport::default());
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_is_resolved_at_flush_time() {
        let client = Arc::new(Recorder::default());
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Daily, true);

        buffer.append(doc());
        exec.flush_as_of(Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap()).await.unwrap();
        buffer.append(doc());
        buffer.append(doc());
        exec.flush_as_of(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 1).unwrap()).await.unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("python-logs-2024.03.01".to_string(), BulkOp::Index, 1),
                ("python-logs-2024.03.02".to_string(), BulkOp::Index, 2),
            ]
        );
    }

    #[tokio::test]
    async fn data_stream_uses_create_and_plain_name() {
        let client = Arc::new(Recorder::default());
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::DataStream, true);

        buffer.append(doc());
        let report = exec.flush().await.unwrap();

        assert_eq!(report.index.as_deref(), Some("python-logs"));
        assert_eq!(client.calls.lock().unwrap()[0].1, BulkOp::Create);
    }

    #[tokio::test]
    async fn rejections_raise_when_configured() {
        let client = Arc::new(Recorder { reject_every: Some(2), ..Recorder::default() });
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Never, true);

        for _ in 0..4 {
            buffer.append(doc());
        }
        let err = exec.flush().await.unwrap_err();

        match err {
            FlushError::Rejected { rejected, total, reason } => {
                assert_eq!((rejected, total), (2, 4));
                assert_eq!(reason, "mapper_parsing_exception");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn rejections_are_counted_and_dropped_otherwise() {
        let client = Arc::new(Recorder { reject_every: Some(2), ..Recorder::default() });
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Never, false);

        for _ in 0..4 {
            buffer.append(doc());
        }
        let report = exec.flush().await.unwrap();
        assert_eq!(report.rejected, 2);

        // rejected documents are not buffered again
        assert!(buffer.is_empty());
        assert_eq!(exec.flush().await.unwrap(), FlushReport::default());

        let stats = exec.stats.snapshot();
        assert_eq!((stats.submitted, stats.accepted, stats.rejected), (4, 2, 2));
        assert_eq!(stats.failed_flushes, 1);
    }

    #[tokio::test]
    async fn surplus_outcomes_are_ignored() {
        let client = Arc::new(Recorder { surplus: 2, ..Recorder::default() });
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Never, true);
        buffer.append(doc());

        let report = exec.flush().await.unwrap();
        assert_eq!((report.submitted, report.rejected), (1, 0));

        let client = Arc::new(Recorder { reject_every: Some(1), surplus: 3, ..Recorder::default() });
        let (buffer, exec) = executor(client, RotationPolicy::Never, false);
        buffer.append(doc());
        buffer.append(doc());

        let report = exec.flush().await.unwrap();
        assert_eq!(report.rejected, 2);
        let stats = exec.stats.snapshot();
        assert_eq!((stats.submitted, stats.accepted, stats.rejected), (2, 0, 2));
    }

    #[tokio::test]
    async fn transport_failure_loses_the_batch() {
        let client = Arc::new(Recorder { fail: true, ..Recorder::default() });
        let (buffer, exec) = executor(Arc::clone(&client), RotationPolicy::Never, false);
        buffer.append(doc());
        buffer.append(doc());
        assert_eq!(exec.flush().await.unwrap().submitted, 2);
        assert_eq!(exec.stats.snapshot().lost, 2);

        let client = Arc::new(Recorder { fail: true, ..Recorder::default() });
        let (buffer, exec) = executor(client, RotationPolicy::Never, true);
        buffer.append(doc());
        assert!(matches!(exec.flush().await, Err(FlushError::Client(ClientError::Transport(_)))));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn try_flush_skips_while_a_flush_runs() {
        let client = Arc::new(Recorder::default());
        let (buffer, exec) = executor(client, RotationPolicy::Never, true);
        buffer.append(doc());

        let guard = exec.in_flight.lock().await;
        assert!(exec.try_flush().await.is_none());
        assert_eq!(buffer.len(), 1);
        drop(guard);

        let report = exec.try_flush().await.unwrap().unwrap();
        assert_eq!(report.submitted, 1);
    }
}
