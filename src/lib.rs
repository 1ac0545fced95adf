//! Buffered shipping of log records to OpenSearch.
//!
//! An [`OpenSearchHandler`] converts records into ECS shaped documents,
//! keeps them in memory and writes them with one `_bulk` request whenever
//! the buffer fills up or the flush interval elapses. The destination
//! index is computed at flush time from a base name and a
//! [`RotationPolicy`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use opensearch_log_sink::{ConnectionParams, HandlerConfig, OpenSearchHandler};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let params = ConnectionParams::new().with("hosts", "https://localhost:9200");
//! let handler = Arc::new(OpenSearchHandler::connect(HandlerConfig::new("my-logs"), params)?);
//! opensearch_log_sink::init::init_tracing(Arc::clone(&handler))?;
//!
//! tracing::info!(topic = "dev", "this message will be indexed");
//!
//! handler.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod document;
pub mod env;
pub mod error;
pub mod flush;
pub mod handler;
pub mod index;
pub mod init;
pub mod layer;
pub mod noop;
pub mod record;
pub mod scheduler;

#[cfg(feature = "opensearch")]
pub mod opensearch;

pub use client::{BulkOp, ConnectionParams, DocumentStoreClient, WriteOutcome};
pub use config::HandlerConfig;
pub use document::Document;
pub use error::{ClientError, ConfigError, FlushError};
pub use flush::{FlushReport, HandlerStats};
pub use handler::OpenSearchHandler;
pub use index::{resolve_index_name, DateFormat, RotationPolicy};
pub use record::LogRecord;
