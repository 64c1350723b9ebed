//! HTTP transport used by the provider adapters.
//!
//! Providers talk to their sources through [`HttpTransport`] so the JSON
//! mapping of each adapter can be exercised against a mocked transport.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;

/// A GET request for a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRequest {
    /// Fully built request URL.
    pub url: Url,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl JsonRequest {
    /// Create a request without headers.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <key>` when a key is configured.
    #[must_use]
    pub fn bearer(self, key: Option<&str>) -> Self {
        match key {
            Some(key) => self.header("Authorization", format!("Bearer {key}")),
            None => self,
        }
    }
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body, `None` if the body was empty.
    pub body: Option<Value>,
}

impl JsonResponse {
    /// A 200 response.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// A response with an arbitrary status.
    #[must_use]
    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// Audit representation of a non-success response.
    #[must_use]
    pub fn into_raw(self) -> Value {
        json!({ "status": self.status, "body": self.body })
    }
}

/// Transport capable of fetching JSON documents.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a GET request.
    ///
    /// Any status code is returned as a response; only connection failures,
    /// timeouts and undecodable success bodies are errors.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or malformed JSON.
    async fn get_json(&self, request: &JsonRequest) -> Result<JsonResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend fails to initialize.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cert-audit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, request: &JsonRequest) -> Result<JsonResponse> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                // Error pages are often HTML; keep them as evidence
                Err(_) if !status.is_success() => Some(Value::String(text)),
                Err(e) => return Err(Error::Json(e)),
            }
        };

        Ok(JsonResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Append percent-encoded path segments to `base`.
///
/// # Errors
///
/// Returns an error if `base` cannot carry a path (e.g. `mailto:`).
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse a provider base URL from configuration.
///
/// # Errors
///
/// Returns an error if the URL is invalid or not http(s).
pub(crate) fn parse_base_url(base: &str) -> Result<Url> {
    let url: Url = base
        .parse()
        .map_err(|e| Error::Config(format!("invalid provider URL {base}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "provider URL must be http(s): {base}"
        )));
    }
    Ok(url)
}
