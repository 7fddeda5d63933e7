//! Shared utilities for integration testing: a programmable mock
//! transport plus token and config helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

use dhara_client::auth::TokenStore;
use dhara_client::{
    ApiClient, ClientConfig, RawResponse, RequestDescriptor, Transport, TransportError,
};

/// One scripted transport outcome, optionally delayed.
pub struct Scripted {
    pub delay: Duration,
    pub result: Result<RawResponse, TransportError>,
}

impl Scripted {
    pub fn ok(body: Value) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(RawResponse {
                status,
                headers: HashMap::new(),
                body,
            }),
        }
    }

    pub fn network(error: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = dyn Fn(&RequestDescriptor, u32) -> Scripted + Send + Sync;

/// Programmable transport: the handler sees each descriptor plus a global
/// call index and scripts the outcome.
pub struct MockTransport {
    handler: Box<Handler>,
    calls: AtomicU32,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&RequestDescriptor, u32) -> Scripted + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Total calls that reached the transport.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls whose descriptor path equals `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(descriptor.clone());
        let scripted = (self.handler)(descriptor, index);
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

/// Config tuned for fast tests: short backoff, long rate-limit window.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig {
        base_url: "https://api.dhara.test".to_string(),
        ..ClientConfig::default()
    };
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config
}

/// Client over a mock transport with an in-memory token store.
pub fn client_with(config: ClientConfig, transport: Arc<MockTransport>) -> ApiClient {
    init_tracing();
    let tokens = Arc::new(TokenStore::in_memory(config.auth.clone()));
    ApiClient::with_transport(config, transport, tokens).expect("client config is valid")
}

/// Honor RUST_LOG when debugging a failing test. Safe to call repeatedly.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Unsigned but structurally valid token expiring `secs` from now. Each
/// call mints a distinct token (via a `jti` nonce) so tests can rely on
/// two tokens with the same expiry not comparing equal.
pub fn token_expiring_in(secs: i64) -> String {
    static NONCE: AtomicU32 = AtomicU32::new(0);
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = (now_secs() as i64 + secs).max(0);
    let claims = json!({
        "sub": "user-1",
        "exp": exp,
        "jti": NONCE.fetch_add(1, Ordering::Relaxed),
        "permissions": ["bookings:read"],
        "roles": ["client"],
    });
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header}.{payload}.sig")
}

/// Bearer header value carried by a descriptor, if any.
pub fn bearer_of(descriptor: &RequestDescriptor) -> Option<String> {
    descriptor
        .headers
        .get(reqwest::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").to_string())
}
