use crate::handler::OpenSearchHandler;
use crate::record::{ErrorInfo, LogRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to an [`OpenSearchHandler`].
///
/// Events are buffered synchronously. When an event fills the buffer the
/// flush is spawned on the current tokio runtime, since `on_event` cannot
/// await; outside a runtime the documents wait for the handler's timer.
///
/// Events emitted by this crate itself are ignored so that failures to
/// ship logs are never shipped as logs.
pub struct OpenSearchLayer {
    handler: Arc<OpenSearchHandler>,
    max_level: Level,
}

impl OpenSearchLayer {
    /// Capture events at `INFO` and above.
    pub fn new(handler: Arc<OpenSearchHandler>) -> Self {
        Self::with_max_level(handler, Level::INFO)
    }

    /// Capture events at `max_level` and above, e.g. `Level::WARN` keeps
    /// `WARN` and `ERROR`.
    pub fn with_max_level(handler: Arc<OpenSearchHandler>, max_level: Level) -> Self {
        Self { handler, max_level }
    }

    pub fn handler(&self) -> &Arc<OpenSearchHandler> {
        &self.handler
    }
}

impl<S> Layer<S> for OpenSearchLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut error: Option<ErrorInfo> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message, error: &mut error };
        event.record(&mut visitor);

        let mut record = LogRecord::new(meta.level().as_str(), meta.target());
        record.message = message;
        record.module_path = meta.module_path().map(|s| s.to_string());
        record.file = meta.file().map(|s| s.to_string());
        record.line = meta.line();
        record.fields = fields;
        record.error = error;

        if self.handler.append(&record) {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let executor = Arc::clone(self.handler.executor());
                    runtime.spawn(async move {
                        if let Err(e) = executor.flush().await {
                            tracing::error!(error = %e, "threshold flush failed");
                        }
                    });
                }
                Err(_) => {
                    tracing::debug!("no tokio runtime on this thread, leaving flush to the timer");
                }
            }
        }
    }
}

use tracing::field::{Field, Visit};

/// Collects event fields. The first `dyn Error` value becomes the
/// record's [`ErrorInfo`]; a plain field named `error` is moved there too
/// so it never collides with the `error` object of the document.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
    pub error: &'a mut Option<ErrorInfo>,
}

impl<'a> FieldVisitor<'a> {
    fn insert_text(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => *self.message = Some(value),
            "error" if self.error.is_none() => {
                *self.error = Some(ErrorInfo { kind: "Error".to_string(), message: value, stack_trace: None });
            }
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.error.is_none() {
            *self.error = Some(ErrorInfo::from_dyn(value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert_text(field, format!("{:?}", value));
    }
}
