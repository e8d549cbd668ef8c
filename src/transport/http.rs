use crate::config::HttpConfig;
use crate::error_code::StandardErrorCode;
use crate::{Error, Result};
use reqwest::{redirect, Proxy};
use serde_json::Value;
use std::time::Duration;

/// Owns the pooled `reqwest::Client` handed to every upstream client.
///
/// Built once at process start and cloned into each component (the client is an
/// `Arc` internally).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Self::builder(config)
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client })
    }

    /// Client for forwarding page requests: redirects are returned to the browser, not followed.
    pub fn passthrough(config: &HttpConfig) -> Result<Self> {
        let client = Self::builder(config)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client })
    }

    fn builder(config: &HttpConfig) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(config.pool_idle_timeout_secs)));

        if let Some(proxy_url) = config.proxy_url.as_deref() {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!(error = %e, "ignoring invalid proxy url"),
            }
        }
        builder
    }

    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }
}

/// Decode a JSON body, turning non-2xx responses into [`Error::Remote`].
pub async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(remote_error(status.as_u16(), &body));
    }
    response
        .json()
        .await
        .map_err(Error::from)
}

/// Build an [`Error::Remote`] from an error response body.
///
/// Recognizes the google.rpc shape (`{"error": {"message", "status"}}`) and the flat
/// Appwrite shape (`{"message", "type"}`); anything else keeps the raw text.
pub fn remote_error(status: u16, body: &str) -> Error {
    let json: Option<Value> = serde_json::from_str(body).ok();
    let message = json
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("errors").and_then(|e| e.get(0)))
                .and_then(|m| m.as_str())
        })
        .map(String::from)
        .unwrap_or_else(|| body.trim().to_string());
    let provider_code = json.as_ref().and_then(|v| {
        v.pointer("/error/status")
            .or_else(|| v.get("type"))
            .and_then(|c| c.as_str())
            .map(String::from)
    });

    Error::Remote {
        status,
        class: StandardErrorCode::classify(status, provider_code.as_deref()),
        message: if message.is_empty() {
            format!("upstream returned HTTP {}", status)
        } else {
            message
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("response consumer closed the connection")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

// Request URLs carry query credentials, so they are stripped before the error is kept.
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}
