//! Interceptor pipeline wrapping the transport.
//!
//! # Data Flow
//! ```text
//! execute(descriptor)
//!     → outbound stage (request id, tracing headers, bearer token,
//!       local rate limit, body scan)
//!     → transport.send()
//!     → inbound stage:
//!         2xx            → integrity check (log-only), payload returned
//!         401, fresh     → single-flight refresh → replay once
//!         retryable      → backoff sleep, retry_count += 1, resend
//!         anything else  → normalized ApiError
//! ```
//!
//! # Design Decisions
//! - A replayed request is never refresh-eligible again (no refresh loops)
//! - Rate limiting rejects locally, before any network spend
//! - All shared state mutates synchronously before await points
//! - Config is an atomic snapshot; each execute reads one consistent view

pub mod rate_limit;
pub mod security;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use url::Url;

use crate::auth::{RefreshCoordinator, SessionEvent, SessionEvents, TokenStore};
use crate::config::validation::validate_config;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::observability::metrics;
use crate::pipeline::rate_limit::{bucket_key, RateLimiter};
use crate::resilience::{RequestFailure, RetryPolicy};
use crate::transport::{HttpTransport, RequestDescriptor, Transport};

const HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const HEADER_CLIENT_VERSION: HeaderName = HeaderName::from_static("x-client-version");
const HEADER_TIMESTAMP: HeaderName = HeaderName::from_static("x-timestamp");

/// The interceptor pipeline. One instance per API client; cheap to share
/// behind an `Arc`.
pub struct ApiPipeline {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    refresh: RefreshCoordinator,
    rate_limiter: RateLimiter,
    session: SessionEvents,
    config: ArcSwap<ClientConfig>,
}

impl ApiPipeline {
    /// Build a pipeline over an injected transport and token store.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
    ) -> Result<Self, ApiError> {
        validate_config(&config).map_err(validation_error)?;

        let session = SessionEvents::new();
        let refresh = RefreshCoordinator::new(
            transport.clone(),
            tokens.clone(),
            session.clone(),
            config.auth.refresh_path.clone(),
            Duration::from_millis(config.timeouts.refresh_ms),
        );

        Ok(Self {
            transport,
            tokens,
            refresh,
            rate_limiter: RateLimiter::new(),
            session,
            config: ArcSwap::from_pointee(config),
        })
    }

    /// Build with the reqwest transport and an in-memory token store.
    pub fn with_defaults(config: ClientConfig) -> Result<Arc<Self>, ApiError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let tokens = Arc::new(TokenStore::in_memory(config.auth.clone()));
        Ok(Arc::new(Self::new(config, transport, tokens)?))
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Subscribe to session lifecycle events (termination on refresh
    /// failure). Consumers decide what "redirect to login" means.
    pub fn subscribe_session(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Swap the runtime configuration snapshot.
    pub fn update_config(&self, config: ClientConfig) -> Result<(), ApiError> {
        validate_config(&config).map_err(validation_error)?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    pub fn config_snapshot(&self) -> Arc<ClientConfig> {
        self.config.load_full()
    }

    /// Send a request through both interceptor stages. This is the single
    /// entry point every domain service and the facade go through.
    pub async fn execute(&self, mut descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let config = self.config.load_full();
        self.outbound(&mut descriptor, &config)?;

        let policy = RetryPolicy::new(config.retries.clone());
        let method = descriptor.method.to_string();
        let mut replayed = false;

        loop {
            let outcome = self.transport.send(&descriptor).await;

            match outcome {
                Ok(response) if response.is_success() => {
                    security::verify_integrity(
                        descriptor.id,
                        &response,
                        &config.security.integrity_header,
                    );
                    metrics::record_request(&method, response.status, descriptor.created_at);
                    tracing::debug!(
                        request_id = %descriptor.id,
                        method = %descriptor.method,
                        path = %descriptor.path,
                        status = response.status,
                        elapsed_ms = descriptor.created_at.elapsed().as_millis() as u64,
                        "request succeeded"
                    );
                    return Ok(response.body);
                }

                Ok(response) if response.status == 401 && !replayed => {
                    tracing::info!(
                        request_id = %descriptor.id,
                        path = %descriptor.path,
                        "authentication failure, attempting token refresh"
                    );
                    match self.refresh.refresh_access_token().await {
                        Ok(token) => {
                            if let Ok(value) = HeaderValue::try_from(format!("Bearer {token}")) {
                                descriptor.headers.insert(AUTHORIZATION, value);
                            }
                            // One replay only; a second 401 surfaces below.
                            replayed = true;
                            continue;
                        }
                        Err(_) => {
                            metrics::record_request(&method, 401, descriptor.created_at);
                            return Err(ApiError::SessionExpired);
                        }
                    }
                }

                Ok(response) => {
                    let failure = RequestFailure::Status(response.status);
                    let decision = policy.decide(&failure, descriptor.retry_count);
                    if decision.retry {
                        descriptor.retry_count += 1;
                        metrics::record_retry(&method);
                        tracing::info!(
                            request_id = %descriptor.id,
                            attempt = descriptor.retry_count,
                            delay_ms = decision.delay.as_millis() as u64,
                            status = response.status,
                            "retrying request"
                        );
                        tokio::time::sleep(decision.delay).await;
                        continue;
                    }

                    metrics::record_request(&method, response.status, descriptor.created_at);
                    if response.status == 401 {
                        // Replayed request still unauthorized.
                        return Err(ApiError::Auth {
                            message: "request rejected after token refresh".to_string(),
                        });
                    }
                    return Err(ApiError::from_response(response.status, &response.body));
                }

                Err(transport_err) => {
                    let kind = transport_err.network_kind();
                    let failure = RequestFailure::NoResponse(kind);
                    let decision = policy.decide(&failure, descriptor.retry_count);
                    if decision.retry {
                        descriptor.retry_count += 1;
                        metrics::record_retry(&method);
                        tracing::info!(
                            request_id = %descriptor.id,
                            attempt = descriptor.retry_count,
                            delay_ms = decision.delay.as_millis() as u64,
                            error = %transport_err,
                            "retrying after network error"
                        );
                        tokio::time::sleep(decision.delay).await;
                        continue;
                    }

                    metrics::record_network_failure(&method, kind.as_str());
                    tracing::error!(
                        request_id = %descriptor.id,
                        path = %descriptor.path,
                        error = %transport_err,
                        "request failed without response"
                    );
                    return Err(transport_err.into());
                }
            }
        }
    }

    /// Outbound stage: tracing headers, auth, local rate limit, body scan.
    fn outbound(
        &self,
        descriptor: &mut RequestDescriptor,
        config: &ClientConfig,
    ) -> Result<(), ApiError> {
        descriptor
            .timeout
            .get_or_insert(Duration::from_millis(config.timeouts.request_ms));

        if let Ok(value) = HeaderValue::try_from(descriptor.id.to_string()) {
            descriptor.headers.insert(HEADER_REQUEST_ID, value);
        }
        descriptor.headers.insert(
            HEADER_CLIENT_VERSION,
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        if let Ok(value) = HeaderValue::try_from(unix_millis().to_string()) {
            descriptor.headers.insert(HEADER_TIMESTAMP, value);
        }

        if !descriptor.headers.contains_key(AUTHORIZATION) {
            let token = self.tokens.get_access_token().or_else(|| {
                if config.demo_auth_allowed() {
                    tracing::debug!(request_id = %descriptor.id, "using demo auth token");
                    config.auth.demo_token.clone()
                } else {
                    None
                }
            });
            if let Some(token) = token {
                if let Ok(value) = HeaderValue::try_from(format!("Bearer {token}")) {
                    descriptor.headers.insert(AUTHORIZATION, value);
                }
            }
        }

        let host = Url::parse(&config.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_default();
        let key = bucket_key(&descriptor.method, &host, &descriptor.path);
        if !self.rate_limiter.check(&key, &config.rate_limit) {
            return Err(ApiError::RateLimit { key });
        }

        if config.security.scan_request_bodies {
            if let Some(body) = &descriptor.body {
                security::scan_body(descriptor.id, body);
            }
        }

        Ok(())
    }
}

fn validation_error(errors: Vec<crate::config::validation::ValidationError>) -> ApiError {
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    ApiError::Validation { message }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
