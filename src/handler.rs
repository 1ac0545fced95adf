use serde_json::{Map, Value};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::client::DocumentStoreClient;
use crate::config::HandlerConfig;
use crate::document::{static_fields, transform};
use crate::error::{ClientError, ConfigError, FlushError};
use crate::flush::{FlushExecutor, FlushReport, FlushTarget, HandlerStats, Stats};
use crate::record::LogRecord;
use crate::scheduler::FlushScheduler;

/// Buffers log records and ships them to a document store in bulk.
///
/// Records are converted to documents as they arrive and kept in memory
/// until either `buffer_size` documents are pending or `flush_interval`
/// elapses. Each handler owns its buffer and its flush timer; dropping or
/// closing one handler never affects another.
///
/// Call [`OpenSearchHandler::close`] before shutting down: it stops the
/// timer and flushes whatever is still buffered.
pub struct OpenSearchHandler {
    config: HandlerConfig,
    static_fields: Map<String, Value>,
    buffer: Arc<Buffer>,
    executor: Arc<FlushExecutor>,
    scheduler: FlushScheduler,
    stats: Arc<Stats>,
    // Appends hold the read side so that `close` cannot slip its final
    // flush between an append's check and its push.
    closed: RwLock<bool>,
}

impl OpenSearchHandler {
    /// Create a handler writing through `client` and start its flush
    /// timer.
    ///
    /// **Errors**
    /// - any [`ConfigError`] from [`HandlerConfig::validate`];
    /// - [`ConfigError::NoRuntime`] when called outside a tokio runtime.
    pub fn new(config: HandlerConfig, client: Arc<dyn DocumentStoreClient>) -> Result<Self, ConfigError> {
        let date_format = config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let stats = Arc::new(Stats::default());
        let buffer = Arc::new(Buffer::new(config.buffer_size));
        let target = FlushTarget {
            index_name: config.index_name.clone(),
            rotation: config.effective_rotation(),
            date_format,
            separator: config.name_separator.clone(),
        };
        let executor = Arc::new(FlushExecutor::new(
            Arc::clone(&buffer),
            client,
            target,
            config.raise_on_submit_error,
            Arc::clone(&stats),
        ));
        let scheduler = FlushScheduler::start(Arc::clone(&executor), config.flush_interval);

        debug!(
            index = %config.index_name,
            rotation = %config.effective_rotation(),
            buffer_size = config.buffer_size,
            "log handler started"
        );

        Ok(Self {
            static_fields: static_fields(&config.extra_fields),
            config,
            buffer,
            executor,
            scheduler,
            stats,
            closed: RwLock::new(false),
        })
    }

    /// Create a handler backed by an [`OpenSearchClient`](crate::opensearch::OpenSearchClient)
    /// built from `params`.
    #[cfg(feature = "opensearch")]
    pub fn connect(
        config: HandlerConfig,
        params: crate::client::ConnectionParams,
    ) -> Result<Self, ConfigError> {
        params.ensure_present()?;
        let client = crate::opensearch::OpenSearchClient::from_params(&params)?;
        Self::new(config, Arc::new(client))
    }

    /// Convert and buffer a record without flushing.
    ///
    /// Returns `true` when this record filled the buffer, i.e. the caller
    /// should arrange for a flush. Records given to a closed handler are
    /// dropped and `false` is returned.
    pub fn append(&self, record: &LogRecord) -> bool {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return false;
        }
        let doc = transform(record, &self.static_fields);
        self.stats.emitted.fetch_add(1, Ordering::Relaxed);
        self.buffer.append(doc)
    }

    /// Buffer a record, flushing on the calling task if the buffer is full.
    ///
    /// A caller that logs faster than the store absorbs therefore pays for
    /// the flush itself instead of growing the buffer.
    pub async fn emit(&self, record: &LogRecord) -> Result<(), FlushError> {
        if self.is_closed() {
            return Err(FlushError::Closed);
        }
        if self.append(record) {
            self.executor.flush().await?;
        }
        Ok(())
    }

    /// Flush everything currently buffered.
    pub async fn flush(&self) -> Result<FlushReport, FlushError> {
        self.executor.flush().await
    }

    /// Stop the flush timer, flush what is left and release the client.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<(), FlushError> {
        {
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return Ok(());
            }
            *closed = true;
        }

        self.scheduler.stop().await;
        let result = self.executor.flush().await;
        self.executor.client().close().await;
        debug!(stats = ?self.stats(), "log handler closed");
        result.map(|_| ())
    }

    /// Check that the document store is reachable.
    pub async fn ping(&self) -> Result<bool, ClientError> {
        self.executor.client().ping().await
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of documents waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> HandlerStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub(crate) fn executor(&self) -> &Arc<FlushExecutor> {
        &self.executor
    }
}

impl Drop for OpenSearchHandler {
    fn drop(&mut self) {
        self.scheduler.cancel();
        let pending = self.buffer.len();
        if pending > 0 {
            warn!(pending, "log handler dropped without close, buffered documents are lost");
        }
    }
}
