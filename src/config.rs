use serde_json::{Map, Value};
use std::time::Duration;

use crate::env::*;
use crate::error::ConfigError;
use crate::index::{DateFormat, RotationPolicy};

/// Handler configuration.
///
/// Controls where documents go (index name and rotation), how many
/// documents are buffered before a flush is forced, how often the buffer
/// is flushed regardless of its size, and what happens when the store
/// rejects a batch. A handler keeps its configuration for its whole
/// life; build a new handler to change it.
///
/// **Fields**
/// - `index_name`: base name of the destination index.
/// - `rotation`: how often a new index is started.
/// - `date_format`: `strftime` pattern of the date suffix, only used by
///   time bucketed policies.
/// - `name_separator`: inserted between `index_name` and the date.
/// - `is_data_stream`: write into a data stream; forces
///   [`RotationPolicy::DataStream`].
/// - `buffer_size`: number of buffered documents that forces a flush.
/// - `flush_interval`: maximum time between flushes.
/// - `extra_fields`: added to every document, below caller fields.
/// - `raise_on_submit_error`: return submission failures to the flush
///   caller instead of counting and dropping them.
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    pub index_name: String,
    pub rotation: RotationPolicy,
    pub date_format: String,
    pub name_separator: String,
    pub is_data_stream: bool,
    pub buffer_size: usize,
    pub flush_interval: Duration,
    pub extra_fields: Map<String, Value>,
    pub raise_on_submit_error: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            index_name: "rust-logs".to_string(),
            rotation: RotationPolicy::Daily,
            date_format: "%Y.%m.%d".to_string(),
            name_separator: "-".to_string(),
            is_data_stream: false,
            buffer_size: 1000,
            flush_interval: Duration::from_secs(1),
            extra_fields: Map::new(),
            raise_on_submit_error: false,
        }
    }
}

impl HandlerConfig {
    /// Configuration writing to `index_name` with every other option at
    /// its default.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self { index_name: index_name.into(), ..Self::default() }
    }

    /// The policy actually applied, taking `is_data_stream` into account.
    pub fn effective_rotation(&self) -> RotationPolicy {
        if self.is_data_stream {
            RotationPolicy::DataStream
        } else {
            self.rotation
        }
    }

    /// Check every option and return the parsed date format.
    pub fn validate(&self) -> Result<DateFormat, ConfigError> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::EmptyIndexName);
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::NonPositiveFlushInterval);
        }
        DateFormat::new(self.date_format.clone())
    }

    /// Load a configuration from the `LOG_SINK_*` environment variables,
    /// keeping defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = HandlerConfig {
            index_name: env_or(LOG_SINK_INDEX_NAME_ENV, "rust-logs"),
            date_format: env_or(LOG_SINK_INDEX_DATE_FORMAT_ENV, "%Y.%m.%d"),
            name_separator: env_or(LOG_SINK_INDEX_NAME_SEP_ENV, "-"),
            ..Self::default()
        };
        if let Some(rotation) = env_parse(LOG_SINK_INDEX_ROTATE_ENV)? {
            config.rotation = rotation;
        }
        if let Some(is_data_stream) = env_parse(LOG_SINK_IS_DATA_STREAM_ENV)? {
            config.is_data_stream = is_data_stream;
        }
        if let Some(buffer_size) = env_parse(LOG_SINK_BUFFER_SIZE_ENV)? {
            config.buffer_size = buffer_size;
        }
        if let Some(seconds) = env_parse::<f64>(LOG_SINK_FLUSH_FREQUENCY_ENV)? {
            config.flush_interval = flush_interval_from_secs(seconds)?;
        }
        if let Some(raise) = env_parse(LOG_SINK_RAISE_ON_INDEX_EXC_ENV)? {
            config.raise_on_submit_error = raise;
        }
        Ok(config)
    }
}

/// Convert a fractional number of seconds into a flush interval.
pub fn flush_interval_from_secs(seconds: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(ConfigError::NonPositiveFlushInterval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HandlerConfig::default();
        assert_eq!(config.validate().unwrap().as_str(), "%Y.%m.%d");
        assert_eq!(config.effective_rotation(), RotationPolicy::Daily);
    }

    #[test]
    fn data_stream_overrides_rotation() {
        let config = HandlerConfig {
            rotation: RotationPolicy::Weekly,
            is_data_stream: true,
            ..HandlerConfig::new("logs-app")
        };
        assert_eq!(config.effective_rotation(), RotationPolicy::DataStream);
    }

    #[test]
    fn rejects_degenerate_values() {
        let zero_buffer = HandlerConfig { buffer_size: 0, ..HandlerConfig::default() };
        assert!(matches!(zero_buffer.validate(), Err(ConfigError::ZeroBufferSize)));

        let zero_interval = HandlerConfig { flush_interval: Duration::ZERO, ..HandlerConfig::default() };
        assert!(matches!(zero_interval.validate(), Err(ConfigError::NonPositiveFlushInterval)));

        let blank = HandlerConfig::new("  ");
        assert!(matches!(blank.validate(), Err(ConfigError::EmptyIndexName)));

        let bad_format = HandlerConfig { date_format: "%Y.%".to_string(), ..HandlerConfig::default() };
        assert!(matches!(bad_format.validate(), Err(ConfigError::InvalidDateFormat(_))));
    }

    #[test]
    fn flush_interval_accepts_fractions_only_when_positive() {
        assert_eq!(flush_interval_from_secs(0.25).unwrap(), Duration::from_millis(250));
        assert!(flush_interval_from_secs(0.0).is_err());
        assert!(flush_interval_from_secs(-1.0).is_err());
        assert!(flush_interval_from_secs(f64::NAN).is_err());
    }
}
