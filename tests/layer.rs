mod common;

use common::RecordingClient;
use opensearch_log_sink::layer::OpenSearchLayer;
use opensearch_log_sink::{HandlerConfig, OpenSearchHandler};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn handler(client: Arc<RecordingClient>, buffer_size: usize) -> Arc<OpenSearchHandler> {
    let config = HandlerConfig {
        buffer_size,
        flush_interval: Duration::from_secs(3600),
        ..HandlerConfig::new("layer-logs")
    };
    Arc::new(OpenSearchHandler::new(config, client).unwrap())
}

#[tokio::test]
async fn events_become_documents() {
    let client = Arc::new(RecordingClient::default());
    let handler = handler(client.clone(), 100);
    let subscriber = Registry::default().with(OpenSearchLayer::new(Arc::clone(&handler)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(user_id = 42, reason = "invalid password", "authentication failed");
        tracing::warn!(ratio = 0.5, "formatted {}", "message");
    });
    handler.close().await.unwrap();

    let docs = client.documents();
    assert_eq!(docs.len(), 2);

    let first = &docs[0];
    assert_eq!(first.get("message"), Some(&json!("authentication failed")));
    assert_eq!(first.get("user_id"), Some(&json!(42)));
    assert_eq!(first.get("reason"), Some(&json!("invalid password")));
    assert_eq!(first.pointer("log.level"), Some(&json!("INFO")));
    assert_eq!(first.pointer("log.logger"), Some(&json!("layer")));
    assert!(first.pointer("log.origin.file.line").is_some());

    let second = &docs[1];
    assert_eq!(second.get("message"), Some(&json!("formatted message")));
    assert_eq!(second.get("ratio"), Some(&json!(0.5)));
    assert_eq!(second.pointer("log.level"), Some(&json!("WARN")));
}

#[tokio::test]
async fn events_below_the_level_are_ignored() {
    let client = Arc::new(RecordingClient::default());
    let handler = handler(client.clone(), 100);
    let layer = OpenSearchLayer::with_max_level(Arc::clone(&handler), Level::WARN);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("noise");
        tracing::info!("still noise");
        tracing::error!("kept");
    });

    assert_eq!(handler.pending(), 1);
    handler.close().await.unwrap();
    assert_eq!(client.documents()[0].get("message"), Some(&json!("kept")));
}

#[tokio::test]
async fn full_buffer_spawns_a_flush() {
    let client = Arc::new(RecordingClient::default());
    let handler = handler(client.clone(), 2);
    let subscriber = Registry::default().with(OpenSearchLayer::new(Arc::clone(&handler)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!("one");
        tracing::error!("two");
    });

    for _ in 0..100 {
        if !client.batches().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(client.batches().len(), 1);
    assert_eq!(client.batches()[0].docs.len(), 2);
}

#[derive(Debug)]
struct QueryError {
    source: std::io::Error,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query failed")
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[tokio::test]
async fn error_fields_fill_the_error_object() {
    let client = Arc::new(RecordingClient::default());
    let handler = handler(client.clone(), 100);
    let subscriber = Registry::default().with(OpenSearchLayer::new(Arc::clone(&handler)));

    let err = QueryError { source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such table") };
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(error = &err as &(dyn std::error::Error + 'static), "lookup failed");
        tracing::error!(error = %"timeout", "retry failed");
    });
    handler.close().await.unwrap();

    let docs = client.documents();
    let first = &docs[0];
    assert_eq!(first.pointer("error.type"), Some(&json!("QueryError")));
    assert_eq!(first.pointer("error.message"), Some(&json!("query failed")));
    assert_eq!(first.pointer("error.stack_trace"), Some(&json!("caused by: no such table\n")));
    assert!(first.get("error").unwrap().is_object());

    let second = &docs[1];
    assert_eq!(second.pointer("error.message"), Some(&json!("timeout")));
    assert!(second.get("error").unwrap().is_object());
}
