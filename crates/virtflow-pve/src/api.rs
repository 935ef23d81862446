//! Proxmox VE HTTP API client
//!
//! Thin JSON client over the cluster's REST API. Every response comes
//! wrapped in a `{"data": ...}` envelope; mutating endpoints put a task
//! identifier (UPID string) or null in `data`.

use reqwest::Method;
use reqwest::header;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{PveError, Result};

/// Connection settings for one cluster node
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// e.g. "https://pve1.example.com:8006"
    pub base_url: String,

    /// API token id, "user@realm!tokenname"
    pub token_id: String,

    /// API token secret
    pub token_secret: String,

    /// Node name operations are scoped to
    pub node: String,

    /// Accept the cluster's self-signed certificate
    pub insecure_tls: bool,
}

/// API client bound to one node
pub struct PveClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
    node: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
}

impl PveClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: format!("PVEAPIToken={}={}", config.token_id, config.token_secret),
            node: config.node,
        })
    }

    /// Node name this client is scoped to
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Typed GET
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let data = self.call(Method::GET, path, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        self.call(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn put<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        self.call(Method::PUT, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.call(Method::DELETE, path, None).await
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/api2/json{}", self.base_url, path);
        debug!(%method, path, "PVE API call");

        let mut request = self
            .client
            .request(method, &url)
            .header(header::AUTHORIZATION, &self.auth_header);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PveError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let envelope: Envelope = response.json().await?;
        Ok(envelope.data)
    }
}

/// Pull a usable message out of an error response. The API reports
/// parameter failures as an `errors` object and otherwise leans on the
/// HTTP status line.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = value.get("errors") {
            if !errors.is_null() {
                return errors.to_string();
            }
        }
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.trim().to_string();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}
