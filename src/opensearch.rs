use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::client::{BulkOp, ConnectionParams, DocumentStoreClient, WriteOutcome};
use crate::document::Document;
use crate::error::{ClientError, ConfigError};

const DEFAULT_HOST: &str = "http://localhost:9200";

/// Credentials sent with every request.
#[derive(Clone, Debug)]
pub enum Auth {
    None,
    Basic { username: String, password: Option<String> },
    ApiKey(String),
}

/// OpenSearch client that writes documents through the HTTP `_bulk` API.
///
/// Requests are spread over the configured hosts round-robin.
pub struct OpenSearchClient {
    client: Client,
    /// Base URLs of the cluster nodes, e.g. "http://localhost:9200".
    hosts: Vec<String>,
    auth: Auth,
    next_host: AtomicUsize,
}

impl OpenSearchClient {
    pub fn new(hosts: Vec<String>, auth: Auth) -> Result<Self, ConfigError> {
        Self::with_client(hosts, auth, Client::new())
    }

    /// Build a client from pass-through connection parameters.
    ///
    /// Recognized keys: `hosts` (string or array), `username`, `password`,
    /// `http_auth` (`[user, password]`), `api_key`, `timeout_secs` and
    /// `verify_certs`. Other keys are ignored.
    pub fn from_params(params: &ConnectionParams) -> Result<Self, ConfigError> {
        let hosts = match params.get("hosts") {
            None => vec![DEFAULT_HOST.to_string()],
            Some(Value::String(host)) => vec![host.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid("hosts", item)))
                .collect::<Result<_, _>>()?,
            Some(other) => return Err(invalid("hosts", other)),
        };

        let auth = if let Some(key) = params.get("api_key").and_then(Value::as_str) {
            Auth::ApiKey(key.to_string())
        } else if let Some(Value::Array(pair)) = params.get("http_auth") {
            match (pair.first().and_then(Value::as_str), pair.get(1).and_then(Value::as_str)) {
                (Some(user), password) => Auth::Basic {
                    username: user.to_string(),
                    password: password.map(str::to_string),
                },
                _ => return Err(invalid("http_auth", &Value::Array(pair.clone()))),
            }
        } else if let Some(user) = params.get("username").and_then(Value::as_str) {
            Auth::Basic {
                username: user.to_string(),
                password: params.get("password").and_then(Value::as_str).map(str::to_string),
            }
        } else {
            Auth::None
        };

        let mut builder = Client::builder();
        if let Some(timeout) = params.get("timeout_secs") {
            let secs = timeout.as_f64().ok_or_else(|| invalid("timeout_secs", timeout))?;
            let timeout = Duration::try_from_secs_f64(secs).map_err(|_| invalid("timeout_secs", &json!(secs)))?;
            builder = builder.timeout(timeout);
        }
        if let Some(Value::Bool(false)) = params.get("verify_certs") {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Client(ClientError::Transport(e.to_string())))?;

        Self::with_client(hosts, auth, client)
    }

    fn with_client(hosts: Vec<String>, auth: Auth, client: Client) -> Result<Self, ConfigError> {
        let hosts: Vec<String> = hosts
            .into_iter()
            .map(|h| h.trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .map(|h| if h.starts_with("http://") || h.starts_with("https://") { h } else { format!("http://{}", h) })
            .collect();
        if hosts.is_empty() {
            return Err(ConfigError::MissingConnectionParams);
        }
        Ok(OpenSearchClient { client, hosts, auth, next_host: AtomicUsize::new(0) })
    }

    fn host(&self) -> &str {
        let idx = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[idx]
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => req,
            Auth::Basic { username, password } => req.basic_auth(username, password.as_ref()),
            Auth::ApiKey(key) => req.header("Authorization", format!("ApiKey {}", key)),
        }
    }
}

/// NDJSON body of a bulk request: one action line and one source line
/// per document.
pub fn bulk_body(index: &str, op: BulkOp, docs: &[Document]) -> Result<String, ClientError> {
    let mut action = serde_json::Map::new();
    action.insert(op.as_str().to_string(), json!({ "_index": index }));
    let action = serde_json::to_string(&action).map_err(|e| ClientError::Encode(e.to_string()))?;

    let mut body = String::new();
    for doc in docs {
        body.push_str(&action);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc).map_err(|e| ClientError::Encode(e.to_string()))?);
        body.push('\n');
    }
    Ok(body)
}

/// Extract per-document outcomes from a `_bulk` response body.
pub fn parse_bulk_response(body: &Value) -> Vec<WriteOutcome> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let result = item.as_object().and_then(|o| o.values().next());
            match result.and_then(|r| r.get("error")) {
                None => WriteOutcome::Accepted,
                Some(error) => {
                    let kind = error.get("type").and_then(Value::as_str).unwrap_or("error");
                    let reason = error.get("reason").and_then(Value::as_str).unwrap_or("unknown");
                    WriteOutcome::Rejected { reason: format!("{}: {}", kind, reason) }
                }
            }
        })
        .collect()
}

#[async_trait]
impl DocumentStoreClient for OpenSearchClient {
    async fn bulk_write(
        &self,
        index: &str,
        op: BulkOp,
        docs: &[Document],
    ) -> Result<Vec<WriteOutcome>, ClientError> {
        let body = bulk_body(index, op, docs)?;
        let url = format!("{}/_bulk", self.host());
        let resp = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(ClientError::Status { status: status.as_u16(), body: text });
        }

        let body: Value = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        let has_errors = body.get("errors").and_then(Value::as_bool).unwrap_or(false);
        let outcomes = parse_bulk_response(&body);
        if !has_errors && outcomes.is_empty() {
            return Ok(vec![WriteOutcome::Accepted; docs.len()]);
        }
        Ok(outcomes)
    }

    async fn ping(&self) -> Result<bool, ClientError> {
        let url = format!("{}/", self.host());
        let resp = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(resp.status().is_success())
    }
}

fn invalid(key: &str, value: &Value) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
}
