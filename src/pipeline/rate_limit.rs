//! Client-side rate limiting.
//!
//! A token bucket per base path (method + host + path, query stripped).
//! An empty bucket rejects the request locally, before any network I/O is
//! spent on it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use reqwest::Method;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-base-path rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Consume one token for `key`, refilling at the configured rate.
    /// Always allows when the limiter is disabled.
    pub fn check(&self, key: &str, config: &RateLimitConfig) -> bool {
        if !config.enabled {
            return true;
        }

        let capacity = config.max_requests as f64;
        let refill_rate = capacity / (config.window_ms as f64 / 1_000.0);

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(capacity));

        let allowed = bucket.try_acquire(capacity, refill_rate);
        if !allowed {
            tracing::warn!(key, "client rate limit exceeded");
            metrics::record_rate_limited(key);
        }
        allowed
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate-limit key: method + host + path with the query stripped, so all
/// calls against one endpoint share a bucket regardless of parameters.
pub fn bucket_key(method: &Method, host: &str, path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    format!("{method} {host}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, window_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max_requests,
            window_ms,
        }
    }

    #[test]
    fn test_bucket_key_strips_query() {
        let key = bucket_key(&Method::GET, "api.example.test", "/bookings?page=2");
        assert_eq!(key, "GET api.example.test/bookings");
    }

    #[test]
    fn test_rejects_when_bucket_empty() {
        let limiter = RateLimiter::new();
        // Long window so no meaningful refill during the test.
        let config = config(3, 3_600_000);

        assert!(limiter.check("GET h/p", &config));
        assert!(limiter.check("GET h/p", &config));
        assert!(limiter.check("GET h/p", &config));
        assert!(!limiter.check("GET h/p", &config));
    }

    #[test]
    fn test_buckets_are_independent() {
        let limiter = RateLimiter::new();
        let config = config(1, 3_600_000);

        assert!(limiter.check("GET h/bookings", &config));
        assert!(!limiter.check("GET h/bookings", &config));
        // A different base path has its own bucket.
        assert!(limiter.check("GET h/reviews", &config));
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let limiter = RateLimiter::new();
        let mut config = config(1, 3_600_000);
        config.enabled = false;

        for _ in 0..10 {
            assert!(limiter.check("GET h/p", &config));
        }
    }

    #[tokio::test]
    async fn test_bucket_refills_over_time() {
        let limiter = RateLimiter::new();
        // 50 requests per 50ms -> one token per millisecond.
        let config = config(50, 50);

        for _ in 0..50 {
            assert!(limiter.check("GET h/p", &config));
        }
        assert!(!limiter.check("GET h/p", &config));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(limiter.check("GET h/p", &config));
    }
}
