//! Conversion of [`LogRecord`]s into ECS shaped documents.

use std::net::UdpSocket;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::record::LogRecord;

/// ECS version advertised in every document.
pub const ECS_VERSION: &str = "1.4.0";
/// Value of `agent.type`.
pub const AGENT_TYPE: &str = "opensearch-log-sink";
/// Value of `agent.version`.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A JSON object ready to be indexed. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a nested field by its dotted path, e.g. `log.origin.file.line`.
    pub fn pointer(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        parts.try_fold(self.0.get(first)?, |value, key| value.get(key))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

/// Build the static fields attached to every document: the user supplied
/// extras on top of the `agent` and `host` defaults, with `ecs.version`
/// always forced.
pub fn static_fields(extra: &Map<String, Value>) -> Map<String, Value> {
    let host = host();
    let mut fields = Map::new();
    fields.insert(
        "agent".to_string(),
        serde_json::json!({
            "type": AGENT_TYPE,
            "version": AGENT_VERSION,
            "ephemeral_id": uuid::Uuid::new_v4().to_string(),
        }),
    );
    fields.insert(
        "host".to_string(),
        serde_json::json!({
            "hostname": host.name,
            "name": host.name,
            "id": host.name,
            "ip": host.ip,
        }),
    );
    merge(&mut fields, extra.clone());
    let mut ecs = Map::new();
    ecs.insert("version".to_string(), Value::from(ECS_VERSION));
    merge(&mut fields, single("ecs", Value::Object(ecs)));
    fields
}

/// Convert a record into a document.
///
/// Base schema fields win over caller fields, which win over
/// `static_fields`. Nested objects are merged key by key.
pub fn transform(record: &LogRecord, static_fields: &Map<String, Value>) -> Document {
    let mut doc = static_fields.clone();

    let caller: Map<String, Value> = record
        .fields
        .iter()
        .map(|(key, value)| (key.clone(), coerce(value.clone())))
        .collect();
    merge(&mut doc, caller);
    merge(&mut doc, base_fields(record));

    Document(doc)
}

fn base_fields(record: &LogRecord) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("@timestamp".to_string(), Value::from(format_timestamp(record)));

    let mut log = Map::new();
    log.insert("level".to_string(), Value::from(record.level.clone()));
    log.insert("logger".to_string(), Value::from(record.target.clone()));

    if let Some(message) = &record.message {
        doc.insert("message".to_string(), Value::from(message.clone()));
        log.insert("original".to_string(), Value::from(message.clone()));
    }

    let mut file = Map::new();
    if let Some(line) = record.line {
        file.insert("line".to_string(), Value::from(line));
    }
    if let Some(path) = &record.file {
        let name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        file.insert("name".to_string(), Value::from(name));
        file.insert("path".to_string(), Value::from(path.clone()));
    }

    let mut origin = Map::new();
    if !file.is_empty() {
        origin.insert("file".to_string(), Value::Object(file));
    }
    insert_opt(&mut origin, "function", record.function.clone());
    insert_opt(&mut origin, "module", record.module_path.clone());
    if !origin.is_empty() {
        log.insert("origin".to_string(), Value::Object(origin));
    }

    let mut process = Map::new();
    insert_opt(&mut process, "pid", record.process_id);
    insert_opt(&mut process, "name", record.process_name.clone());
    if !process.is_empty() {
        log.insert("process".to_string(), Value::Object(process));
    }

    let mut thread = Map::new();
    insert_opt(&mut thread, "id", record.thread_id.clone());
    insert_opt(&mut thread, "name", record.thread_name.clone());
    if !thread.is_empty() {
        log.insert("thread".to_string(), Value::Object(thread));
    }

    doc.insert("log".to_string(), Value::Object(log));

    if let Some(error) = &record.error {
        let mut err = Map::new();
        err.insert("type".to_string(), Value::from(error.kind.clone()));
        err.insert("code".to_string(), Value::from(error.kind.clone()));
        err.insert("id".to_string(), Value::from(uuid::Uuid::new_v4().to_string()));
        err.insert("message".to_string(), Value::from(error.message.clone()));
        insert_opt(&mut err, "stack_trace", error.stack_trace.clone());
        doc.insert("error".to_string(), Value::Object(err));
    }

    doc
}

/// `2021-11-08T10:04:06.122Z`
fn format_timestamp(record: &LogRecord) -> String {
    record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn insert_opt<V: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<V>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Null caller values are indexed as empty strings.
fn coerce(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        other => other,
    }
}

/// Merge `overlay` into `target`. Objects present on both sides are
/// merged recursively; any other collision is won by the overlay.
fn merge(target: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) => {
                if let Some(Value::Object(existing)) = target.get_mut(&key) {
                    merge(existing, incoming);
                    continue;
                }
                target.insert(key, Value::Object(incoming));
            }
            value => {
                target.insert(key, value);
            }
        }
    }
}

struct Host {
    name: String,
    /// Empty when the host has no routable address.
    ip: String,
}

/// Host identity, looked up once per process.
fn host() -> &'static Host {
    static HOST: OnceLock<Host> = OnceLock::new();
    HOST.get_or_init(|| Host { name: hostname(), ip: local_ip().unwrap_or_default() })
}

/// Host name from `LOG_SINK_HOSTNAME`, `HOSTNAME` or the operating system,
/// `"unknown"` when none is available.
pub fn hostname() -> String {
    for key in [crate::env::LOG_SINK_HOSTNAME_ENV, "HOSTNAME"] {
        if let Ok(name) = std::env::var(key) {
            if !name.is_empty() {
                return name;
            }
        }
    }
    match system_hostname() {
        Some(name) => name,
        None => {
            warn!("could not determine host name, using 'unknown'");
            "unknown".to_string()
        }
    }
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name.into_string().ok().filter(|name| !name.is_empty()),
        Err(e) => {
            warn!(error = %e, "failed to read the system host name");
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|name| !name.is_empty())
}

/// Address of the interface that routes outbound traffic. Connecting a
/// UDP socket selects the route without sending a packet.
fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
