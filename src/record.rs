use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::OnceLock;

/// Exception details attached to a [`LogRecord`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorInfo {
    /// Type name of the error, e.g. `std::io::Error`.
    pub kind: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

/// A single log event as captured from the application.
///
/// Every attribute other than `timestamp` and `level` is optional; absent
/// attributes are left out of the indexed document instead of being
/// written as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    /// Logger name. For `tracing` events this is the event target.
    pub target: String,
    pub message: Option<String>,
    pub module_path: Option<String>,
    /// Full path of the source file.
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
    pub thread_id: Option<String>,
    pub thread_name: Option<String>,
    pub process_id: Option<u32>,
    pub process_name: Option<String>,
    /// Caller supplied key/value pairs.
    pub fields: BTreeMap<String, serde_json::Value>,
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    /// Create a record stamped with the current time and the current
    /// thread and process identifiers.
    pub fn new(level: impl Into<String>, target: impl Into<String>) -> Self {
        let thread = std::thread::current();
        LogRecord {
            timestamp: Utc::now(),
            level: level.into(),
            target: target.into(),
            message: None,
            module_path: None,
            file: None,
            line: None,
            function: None,
            thread_id: Some(format!("{:?}", thread.id())),
            thread_name: thread.name().map(|s| s.to_string()),
            process_id: Some(std::process::id()),
            process_name: process_name().map(str::to_string),
            fields: BTreeMap::new(),
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Attach a caller field.
    ///
    /// Values that cannot be represented as JSON (for instance maps with
    /// non-string keys) are stored as their `Debug` rendering, so a
    /// malformed field never prevents the record from being logged.
    pub fn with_field<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + Debug,
    {
        let value = serde_json::to_value(&value)
            .unwrap_or_else(|_| serde_json::Value::String(format!("{:?}", value)));
        self.fields.insert(key.into(), value);
        self
    }

    /// Attach exception details taken from an error and its source chain.
    pub fn with_error<E>(mut self, err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        self.error = Some(ErrorInfo {
            kind: short_type_name::<E>(),
            message: err.to_string(),
            stack_trace: source_chain(err.source()),
        });
        self
    }
}

impl ErrorInfo {
    /// Details of a type-erased error, as handed out by `tracing`.
    ///
    /// The concrete type is gone, so `kind` is the leading identifier of
    /// the `Debug` rendering, which for derived impls is the type or
    /// variant name.
    pub fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        let debug = format!("{:?}", err);
        let kind: String = debug.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
        ErrorInfo {
            kind: if kind.is_empty() { "Error".to_string() } else { kind },
            message: err.to_string(),
            stack_trace: source_chain(err.source()),
        }
    }
}

fn source_chain(mut source: Option<&(dyn std::error::Error + 'static)>) -> Option<String> {
    let mut chain = String::new();
    while let Some(cause) = source {
        chain.push_str("caused by: ");
        chain.push_str(&cause.to_string());
        chain.push('\n');
        source = cause.source();
    }
    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

fn short_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

/// Executable name, looked up once per process.
fn process_name() -> Option<&'static str> {
    static NAME: OnceLock<Option<String>> = OnceLock::new();
    NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
    })
    .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "outer failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn non_string_map_keys_fall_back_to_debug() {
        let mut weird = std::collections::HashMap::new();
        weird.insert((1, 2), "pair");
        let record = LogRecord::new("INFO", "app").with_field("weird", weird);

        let value = &record.fields["weird"];
        assert!(value.as_str().unwrap().contains("pair"));
    }

    #[test]
    fn error_chain_is_captured() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let record = LogRecord::new("ERROR", "app").with_error(&err);

        let info = record.error.unwrap();
        assert_eq!(info.kind, "Outer");
        assert_eq!(info.message, "outer failed");
        assert_eq!(info.stack_trace.as_deref(), Some("caused by: disk gone\n"));
    }

    #[test]
    fn type_erased_errors_keep_kind_and_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let info = ErrorInfo::from_dyn(&err);

        assert_eq!(info.kind, "Outer");
        assert_eq!(info.message, "outer failed");
        assert_eq!(info.stack_trace.as_deref(), Some("caused by: disk gone\n"));
    }

    #[test]
    fn process_name_is_stable_across_records() {
        let first = LogRecord::new("INFO", "app");
        let second = LogRecord::new("INFO", "app");
        assert!(first.process_name.is_some());
        assert_eq!(first.process_name, second.process_name);
        assert!(std::ptr::eq(process_name().unwrap(), process_name().unwrap()));
    }
}
