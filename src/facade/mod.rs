//! Per-consumer fetch state machine.
//!
//! A [`Fetcher`] wraps one logical request (method + path) for one
//! consumer, layering caching, deduplication, cancellation, and optimistic
//! mutation over the pipeline. State transitions follow
//! `idle -> loading -> (success | error)`, observable through a watch
//! channel.
//!
//! # Design Decisions
//! - Last write wins by generation, not arrival: every `execute` bumps a
//!   monotonic counter and only the matching completion may touch state,
//!   so a slow superseded call can never clobber a newer result
//! - Cancellation resets to `idle`, never `error`; once cancelled, the
//!   settled call performs no further state mutation
//! - Optimistic mutation bypasses server confirmation and therefore must
//!   be enabled explicitly
//! - `Drop` cancels the outstanding call, protecting consumers that have
//!   already gone away

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cache::{RequestCache, SharedResult};
use crate::error::ApiError;
use crate::pipeline::ApiPipeline;
use crate::resilience::calculate_backoff;
use crate::transport::RequestDescriptor;

/// Lifecycle of a fetcher's current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of a fetcher's state, broadcast to subscribers.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub status: FetchStatus,
    pub data: Option<Arc<Value>>,
    pub error: Option<Arc<ApiError>>,
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Error
    }

    /// Deserialize the current data into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value((**v).clone()).ok())
    }
}

/// Tuning for one fetcher.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Serve and store TTL-cached responses (GET only).
    pub cache: bool,

    /// Cache TTL override; `None` uses the configured default.
    pub cache_ttl: Option<Duration>,

    /// Collapse identical concurrent requests onto one network call.
    pub dedupe: bool,

    /// Allow `mutate` to push local data without server confirmation.
    pub optimistic_updates: bool,

    /// Attempts made by the user-initiated `retry` wrapper, on top of the
    /// pipeline's transport-level retries.
    pub retry_attempts: u32,

    /// Base delay for the retry wrapper's backoff.
    pub retry_base_delay: Duration,

    /// Backoff ceiling for the retry wrapper.
    pub retry_max_delay: Duration,

    /// Data shown before the first execute and after `reset`.
    pub initial_data: Option<Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache: false,
            cache_ttl: None,
            dedupe: true,
            optimistic_updates: false,
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(1_000),
            retry_max_delay: Duration::from_millis(10_000),
            initial_data: None,
        }
    }
}

/// Per-call parameter and body overrides applied to the base descriptor.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// One consumer's handle on one logical request.
pub struct Fetcher {
    pipeline: Arc<ApiPipeline>,
    cache: RequestCache,
    base: RequestDescriptor,
    options: FetchOptions,
    state: watch::Sender<FetchState>,
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
    last_overrides: Mutex<Option<Overrides>>,
    on_success: Option<Callback<Value>>,
    on_error: Option<Callback<ApiError>>,
}

impl Fetcher {
    pub fn new(
        pipeline: Arc<ApiPipeline>,
        cache: RequestCache,
        base: RequestDescriptor,
        options: FetchOptions,
    ) -> Self {
        let initial = FetchState {
            status: FetchStatus::Idle,
            data: options.initial_data.clone().map(Arc::new),
            error: None,
        };
        let (state, _) = watch::channel(initial);
        Self {
            pipeline,
            cache,
            base,
            options,
            state,
            generation: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            last_overrides: Mutex::new(None),
            on_success: None,
            on_error: None,
        }
    }

    pub fn on_success(mut self, callback: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Current state snapshot.
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Observe state changes. Receivers outliving the fetcher see the
    /// channel close.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Issue the request. Supersedes any call still in flight on this
    /// fetcher: the older call keeps running but loses the right to update
    /// state.
    pub async fn execute(&self, overrides: Overrides) -> Result<Arc<Value>, Arc<ApiError>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = {
            let mut guard = self.cancel.lock().expect("cancel mutex poisoned");
            let token = CancellationToken::new();
            *guard = token.clone();
            token
        };
        *self
            .last_overrides
            .lock()
            .expect("overrides mutex poisoned") = Some(overrides.clone());

        let descriptor = self.build_descriptor(&overrides);
        let key = descriptor.cache_key();
        let config = self.pipeline.config_snapshot();
        let cacheable = self.options.cache && descriptor.method == Method::GET;

        if cacheable {
            if let Some(data) = self.cache.get_cached(&key) {
                tracing::debug!(path = %descriptor.path, "cache hit");
                self.commit_success(generation, &data);
                return Ok(data);
            }
        }

        self.write_state(generation, |s| {
            s.status = FetchStatus::Loading;
            s.error = None;
        });

        let pipeline = self.pipeline.clone();
        let factory = move || {
            async move {
                pipeline
                    .execute(descriptor)
                    .await
                    .map(Arc::new)
                    .map_err(Arc::new)
            }
            .boxed()
        };

        let request: BoxFuture<'static, SharedResult> = if self.options.dedupe {
            self.cache.get_or_create_in_flight(&key, factory).boxed()
        } else {
            factory()
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                // Back to idle, no error surfaced. A dedup'd call settles
                // on its own task and removes its in-flight entry; this
                // fetcher just stops listening for the result.
                self.write_state(generation, |s| s.status = FetchStatus::Idle);
                Err(Arc::new(ApiError::Cancelled))
            }
            result = request => {
                match &result {
                    Ok(data) => {
                        if self.is_current(generation) {
                            self.commit_success(generation, data);
                            if cacheable {
                                let ttl = self.options.cache_ttl.unwrap_or(
                                    Duration::from_millis(config.cache.default_ttl_ms),
                                );
                                self.cache.store(&key, data.clone(), ttl);
                            }
                        }
                    }
                    Err(error) => {
                        if self.is_current(generation) {
                            self.write_state(generation, |s| {
                                s.status = FetchStatus::Error;
                                s.error = Some(error.clone());
                            });
                            if let Some(callback) = &self.on_error {
                                callback(error);
                            }
                        }
                    }
                }
                result
            }
        }
    }

    /// `execute` wrapped in user-initiated retry with backoff. Distinct
    /// from the pipeline's transport-level retries.
    pub async fn execute_with_retry(
        &self,
        overrides: Overrides,
    ) -> Result<Arc<Value>, Arc<ApiError>> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute(overrides.clone()).await {
                Ok(data) => return Ok(data),
                Err(error) if error.is_cancelled() || attempt >= self.options.retry_attempts => {
                    return Err(error);
                }
                Err(error) => {
                    attempt += 1;
                    let delay = calculate_backoff(
                        attempt,
                        self.options.retry_base_delay.as_millis() as u64,
                        self.options.retry_max_delay.as_millis() as u64,
                    );
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying fetch"
                    );
                    let cancel = self.current_cancel();
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Arc::new(ApiError::Cancelled)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Re-issue the last call (or a bare one if none was made yet) through
    /// the retry wrapper.
    pub async fn retry(&self) -> Result<Arc<Value>, Arc<ApiError>> {
        let overrides = self
            .last_overrides
            .lock()
            .expect("overrides mutex poisoned")
            .clone()
            .unwrap_or_default();
        self.execute_with_retry(overrides).await
    }

    /// Cancel the call currently in flight, if any. State returns to idle.
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .expect("cancel mutex poisoned")
            .cancel();
        self.state.send_modify(|s| {
            if s.status == FetchStatus::Loading {
                s.status = FetchStatus::Idle;
            }
        });
    }

    /// Return to `idle` with the initial data. Also retires the current
    /// generation so an in-flight call cannot resurrect the old state.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(FetchState {
            status: FetchStatus::Idle,
            data: self.options.initial_data.clone().map(Arc::new),
            error: None,
        });
    }

    /// Optimistic local update; requires `optimistic_updates`. The update
    /// sees the current data and returns the replacement, which is also
    /// written through to the cache for cacheable fetchers.
    pub fn mutate(
        &self,
        update: impl FnOnce(Option<Arc<Value>>) -> Value,
    ) -> Result<Arc<Value>, ApiError> {
        if !self.options.optimistic_updates {
            return Err(ApiError::Validation {
                message: "optimistic updates are disabled for this fetcher".to_string(),
            });
        }

        let current = self.state.borrow().data.clone();
        let updated = Arc::new(update(current));
        self.state.send_modify(|s| {
            s.data = Some(updated.clone());
            s.status = FetchStatus::Success;
            s.error = None;
        });

        if self.options.cache && self.base.method == Method::GET {
            let overrides = self
                .last_overrides
                .lock()
                .expect("overrides mutex poisoned")
                .clone()
                .unwrap_or_default();
            let key = self.build_descriptor(&overrides).cache_key();
            let ttl = self.options.cache_ttl.unwrap_or_else(|| {
                Duration::from_millis(self.pipeline.config_snapshot().cache.default_ttl_ms)
            });
            self.cache.store(&key, updated.clone(), ttl);
        }

        tracing::debug!(path = %self.base.path, "optimistic mutation applied");
        Ok(updated)
    }

    fn build_descriptor(&self, overrides: &Overrides) -> RequestDescriptor {
        // Fresh id per attempt; identity for caching comes from
        // method/path/params/body, not the id.
        let mut descriptor = RequestDescriptor::new(self.base.method.clone(), self.base.path.clone());
        descriptor.params = self.base.params.clone();
        descriptor.body = self.base.body.clone();
        descriptor.timeout = self.base.timeout;
        descriptor.headers = self.base.headers.clone();
        for (key, value) in &overrides.params {
            descriptor.params.insert(key.clone(), value.clone());
        }
        if let Some(body) = &overrides.body {
            descriptor.body = Some(body.clone());
        }
        descriptor
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply a state change only if `generation` is still current.
    fn write_state(&self, generation: u64, apply: impl FnOnce(&mut FetchState)) {
        if self.is_current(generation) {
            self.state.send_modify(apply);
        }
    }

    fn commit_success(&self, generation: u64, data: &Arc<Value>) {
        self.write_state(generation, |s| {
            s.status = FetchStatus::Success;
            s.data = Some(data.clone());
            s.error = None;
        });
        if self.is_current(generation) {
            if let Some(callback) = &self.on_success {
                callback(data);
            }
        }
    }

    fn current_cancel(&self) -> CancellationToken {
        self.cancel
            .lock()
            .expect("cancel mutex poisoned")
            .clone()
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        // A consumer that went away must not keep a call running.
        self.cancel
            .lock()
            .expect("cancel mutex poisoned")
            .cancel();
    }
}
