//! Exponential backoff.

use std::time::Duration;

/// Calculate the delay before retry attempt `attempt` (1-based):
/// `min(base * 2^(attempt-1), max)`. Attempt 0 means "no wait".
///
/// Deterministic: the same attempt always yields the same delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    Duration::from_millis(delay_ms.min(max_ms))
}
