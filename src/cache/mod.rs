//! Response caching and request deduplication.
//!
//! Two independent axes share one store:
//! - a TTL-keyed cache of prior successful GET responses;
//! - a map of in-flight request futures, so identical concurrent requests
//!   share one underlying network call (any method; rapid duplicate POSTs
//!   are collapsed too).
//!
//! Entries are never mutated in place, only replaced. The in-flight entry
//! is removed when its future settles, success or failure. The underlying
//! call runs on its own task, so it settles and cleans up even when every
//! awaiting caller has been cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde_json::Value;

use crate::error::{ApiError, NetworkKind};
use crate::observability::metrics;

/// Outcome shared between all callers of one in-flight request.
pub type SharedResult = Result<Arc<Value>, Arc<ApiError>>;
type SharedRequest = Shared<BoxFuture<'static, SharedResult>>;

/// A cached response. Valid while `now - stored_at < ttl`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Arc<Value>,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Thread-safe response cache + in-flight map. Cloning shares the store.
#[derive(Clone, Default)]
pub struct RequestCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    inflight: Arc<DashMap<String, SharedRequest>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached data for `key`, if present and within TTL. Expired entries
    /// are removed on the way.
    pub fn get_cached(&self, key: &str) -> Option<Arc<Value>> {
        match self.entries.get(key) {
            Some(entry) if entry.is_valid() => {
                metrics::record_cache_hit();
                Some(entry.data.clone())
            }
            Some(entry) => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a response, replacing any previous entry for the key.
    pub fn store(&self, key: &str, data: Arc<Value>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl,
            },
        );
        metrics::record_cache_size(self.entries.len());
    }

    /// Drop one cached entry.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop all cached entries whose key starts with `prefix`. Used to bust
    /// a resource family after a mutation.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Sweep expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join the in-flight request for `key`, or start one via `factory`.
    /// All callers get clones of the same shared future; the entry is
    /// removed once it settles, regardless of outcome. The request itself
    /// runs on a spawned task: a caller cancelled mid-await leaves the call
    /// settling in the background instead of freezing it, so the entry
    /// cannot outlive the request.
    pub fn get_or_create_in_flight<F>(&self, key: &str, factory: F) -> SharedRequest
    where
        F: FnOnce() -> BoxFuture<'static, SharedResult>,
    {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                tracing::debug!(key, "deduplicating request");
                metrics::record_dedup_hit();
                existing.get().clone()
            }
            Entry::Vacant(vacant) => {
                let inflight = self.inflight.clone();
                let cleanup_key = key.to_string();
                let future = factory();
                let task = tokio::spawn(async move {
                    let result = future.await;
                    inflight.remove(&cleanup_key);
                    result
                });
                let shared = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(join_err) => Err(Arc::new(ApiError::Network {
                            kind: NetworkKind::Other,
                            message: format!("request task failed: {join_err}"),
                        })),
                    }
                }
                .boxed()
                .shared();
                vacant.insert(shared.clone());
                shared
            }
        }
    }

    /// Number of requests currently in flight (test/diagnostic aid).
    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}
