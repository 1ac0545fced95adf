//! Environment variable names used by this crate for convenient
//! configuration of handlers from microservices.
//!
//! These are purely helpers; the handler itself never reads the
//! environment.

use std::str::FromStr;

use crate::client::ConnectionParams;
use crate::error::ConfigError;

/// Base name of the destination index.
pub const LOG_SINK_INDEX_NAME_ENV: &str = "LOG_SINK_INDEX_NAME";

/// Rotation policy name: `NEVER`, `HOURLY`, `DAILY`, `WEEKLY`, `MONTHLY`,
/// `YEARLY` or `DATA_STREAM`.
pub const LOG_SINK_INDEX_ROTATE_ENV: &str = "LOG_SINK_INDEX_ROTATE";

/// `strftime` pattern of the index date suffix.
pub const LOG_SINK_INDEX_DATE_FORMAT_ENV: &str = "LOG_SINK_INDEX_DATE_FORMAT";

/// Separator between the base name and the date suffix.
pub const LOG_SINK_INDEX_NAME_SEP_ENV: &str = "LOG_SINK_INDEX_NAME_SEP";

/// `true` to write into a data stream.
pub const LOG_SINK_IS_DATA_STREAM_ENV: &str = "LOG_SINK_IS_DATA_STREAM";

/// Number of buffered documents that triggers a flush.
pub const LOG_SINK_BUFFER_SIZE_ENV: &str = "LOG_SINK_BUFFER_SIZE";

/// Seconds between scheduled flushes, fractional values allowed.
pub const LOG_SINK_FLUSH_FREQUENCY_ENV: &str = "LOG_SINK_FLUSH_FREQUENCY";

/// `true` to surface submission errors to the flush caller.
pub const LOG_SINK_RAISE_ON_INDEX_EXC_ENV: &str = "LOG_SINK_RAISE_ON_INDEX_EXC";

/// Comma separated OpenSearch base URLs, e.g. `https://localhost:9200`.
pub const LOG_SINK_OPENSEARCH_HOSTS_ENV: &str = "LOG_SINK_OPENSEARCH_HOSTS";

/// Optional OpenSearch user name.
pub const LOG_SINK_OPENSEARCH_USER_ENV: &str = "LOG_SINK_OPENSEARCH_USER";

/// Optional OpenSearch password.
pub const LOG_SINK_OPENSEARCH_PASSWORD_ENV: &str = "LOG_SINK_OPENSEARCH_PASSWORD";

/// Optional OpenSearch API key.
pub const LOG_SINK_OPENSEARCH_API_KEY_ENV: &str = "LOG_SINK_OPENSEARCH_API_KEY";

/// Overrides the host name written to `host.*`.
pub const LOG_SINK_HOSTNAME_ENV: &str = "LOG_SINK_HOSTNAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an optional environment variable. Unset and empty
/// variables yield `Ok(None)`.
pub fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: raw }),
        _ => Ok(None),
    }
}

impl ConnectionParams {
    /// Build OpenSearch connection parameters from the `LOG_SINK_OPENSEARCH_*`
    /// variables. Returns empty parameters when none are set.
    pub fn from_env() -> Self {
        let mut params = ConnectionParams::new();
        if let Ok(hosts) = std::env::var(LOG_SINK_OPENSEARCH_HOSTS_ENV) {
            let hosts: Vec<String> = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
            if !hosts.is_empty() {
                params = params.with("hosts", hosts);
            }
        }
        for (env_key, param) in [
            (LOG_SINK_OPENSEARCH_USER_ENV, "username"),
            (LOG_SINK_OPENSEARCH_PASSWORD_ENV, "password"),
            (LOG_SINK_OPENSEARCH_API_KEY_ENV, "api_key"),
        ] {
            if let Ok(value) = std::env::var(env_key) {
                params = params.with(param, value);
            }
        }
        params
    }
}
