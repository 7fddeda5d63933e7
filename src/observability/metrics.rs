//! Metrics recording helpers.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners
//! and metric names live in one place. The host application decides on an
//! exporter; without one these are no-ops.
//!
//! # Metrics
//! - `client_requests_total` (counter): completed requests by method, status
//! - `client_request_duration_seconds` (histogram): request latency
//! - `client_retries_total` (counter): transport-level retries by method
//! - `client_rate_limited_total` (counter): local rate-limit rejections
//! - `client_cache_hits_total` / `client_dedup_hits_total` (counters)
//! - `client_cache_entries` (gauge): current cached-response count
//! - `client_token_refresh_total` / `client_session_terminated_total` (counters)

use std::time::Instant;

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("client_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_network_failure(method: &str, kind: &'static str) {
    metrics::counter!(
        "client_network_failures_total",
        "method" => method.to_string(),
        "kind" => kind,
    )
    .increment(1);
}

pub fn record_retry(method: &str) {
    metrics::counter!("client_retries_total", "method" => method.to_string()).increment(1);
}

pub fn record_rate_limited(key: &str) {
    metrics::counter!("client_rate_limited_total", "key" => key.to_string()).increment(1);
}

pub fn record_cache_hit() {
    metrics::counter!("client_cache_hits_total").increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("client_cache_entries").set(entries as f64);
}

pub fn record_dedup_hit() {
    metrics::counter!("client_dedup_hits_total").increment(1);
}

pub fn record_token_refresh() {
    metrics::counter!("client_token_refresh_total").increment(1);
}

pub fn record_session_terminated() {
    metrics::counter!("client_session_terminated_total").increment(1);
}
