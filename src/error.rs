/// Error returned when a handler cannot be built from its configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown index rotation policy: {0:?}")]
    UnknownRotation(String),

    #[error("invalid index date format: {0:?}")]
    InvalidDateFormat(String),

    #[error("index name must not be empty")]
    EmptyIndexName,

    #[error("buffer size must be positive")]
    ZeroBufferSize,

    #[error("flush interval must be positive")]
    NonPositiveFlushInterval,

    #[error("missing document store connection parameters")]
    MissingConnectionParams,

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("handler must be created inside a tokio runtime")]
    NoRuntime,

    #[error("failed to build document store client: {0}")]
    Client(#[source] ClientError),
}

/// Error reported by a [`DocumentStoreClient`](crate::client::DocumentStoreClient).
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("bulk request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode bulk request: {0}")]
    Encode(String),

    #[error("failed to decode bulk response: {0}")]
    Decode(String),
}

/// Error surfaced by a flush when `raise_on_submit_error` is set, or by
/// operations on a closed handler.
#[derive(thiserror::Error, Debug)]
pub enum FlushError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{rejected} of {total} documents rejected by the store: {reason}")]
    Rejected {
        rejected: usize,
        total: usize,
        /// Reason given for the first rejected document.
        reason: String,
    },

    #[error("handler is closed")]
    Closed,
}
