//! Transport contract and the reqwest-backed default implementation.
//!
//! The pipeline never talks to the network directly; it hands a
//! [`RequestDescriptor`] to a [`Transport`] and gets back either a
//! [`RawResponse`] (any status, including errors) or a [`TransportError`]
//! when no response arrived at all. That split is what the retry policy
//! keys on.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ApiError, NetworkKind};

/// A single outgoing request. Immutable once built except `retry_count`,
/// which the pipeline increments on each retry attempt.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Unique id for tracing; also sent as `X-Request-Id`.
    pub id: Uuid,

    pub method: Method,

    /// Path resolved against the configured base URL.
    pub path: String,

    pub headers: HeaderMap,

    /// Query parameters. Ordered map so cache keys are stable.
    pub params: BTreeMap<String, String>,

    pub body: Option<Value>,

    /// Per-request deadline. `None` means "use the configured default";
    /// the pipeline resolves it before the descriptor reaches a transport.
    pub timeout: Option<Duration>,

    pub retry_count: u32,

    pub created_at: Instant,
}

impl RequestDescriptor {
    /// Method defaults are never inferred: a descriptor always carries an
    /// explicit verb, GET here.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            params: BTreeMap::new(),
            body: None,
            timeout: None,
            retry_count: 0,
            created_at: Instant::now(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Identity for caching and dedup: method + path + params + body.
    /// Params are ordered and the body serialization is canonical, so two
    /// descriptors for the same logical request produce the same key.
    pub fn cache_key(&self) -> String {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        let body = self
            .body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        format!("{} {}?{}#{}", self.method, self.path, params, body)
    }
}

/// Response as received from the wire: any status, parsed JSON body
/// (`Null` when empty or not JSON), headers with lowercased names.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Failure before any response arrived.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    pub fn network_kind(&self) -> NetworkKind {
        match self {
            TransportError::Timeout => NetworkKind::Timeout,
            TransportError::Connect(_) => NetworkKind::Connect,
            TransportError::Dns(_) => NetworkKind::Dns,
            TransportError::Other(_) => NetworkKind::Other,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network {
            kind: err.network_kind(),
            message: err.to_string(),
        }
    }
}

/// The wire contract. Object-safe so tests can inject scripted
/// implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// Default transport built on reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::Validation {
            message: format!("invalid base_url {}: {e}", config.base_url),
        })?;
        // Deadlines come from each descriptor, not a client-wide default.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Validation {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        let message = err.to_string();
        if err.is_connect() {
            // hyper reports failed lookups through the connect error.
            if message.contains("dns") {
                return TransportError::Dns(message);
            }
            return TransportError::Connect(message);
        }
        TransportError::Other(message)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let url = self
            .base_url
            .join(&descriptor.path)
            .map_err(|e| TransportError::Other(format!("invalid path: {e}")))?;

        let mut request = self
            .client
            .request(descriptor.method.clone(), url)
            .timeout(descriptor.timeout.unwrap_or(Duration::from_millis(30_000)))
            .headers(descriptor.headers.clone());

        if !descriptor.params.is_empty() {
            request = request.query(&descriptor.params);
        }
        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Self::classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read body: {e}")))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_is_stable_across_param_order() {
        let a = RequestDescriptor::get("/bookings")
            .with_param("from", "2026-08-01")
            .with_param("to", "2026-08-31");
        let b = RequestDescriptor::get("/bookings")
            .with_param("to", "2026-08-31")
            .with_param("from", "2026-08-01");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_distinguishes_method_and_body() {
        let get = RequestDescriptor::get("/bookings");
        let post = RequestDescriptor::post("/bookings");
        assert_ne!(get.cache_key(), post.cache_key());

        let p1 = RequestDescriptor::post("/bookings").with_body(json!({"slot": 1}));
        let p2 = RequestDescriptor::post("/bookings").with_body(json!({"slot": 2}));
        assert_ne!(p1.cache_key(), p2.cache_key());
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-data-integrity".to_string(), "abc".to_string());
        let resp = RawResponse {
            status: 200,
            headers,
            body: Value::Null,
        };
        assert_eq!(resp.header("X-Data-Integrity"), Some("abc"));
        assert!(resp.is_success());
    }
}
