//! Retry decision policy.
//!
//! Pure function of (failure, attempt count, config) with no side effects
//! and no clock access, so it is independently testable. The pipeline owns
//! the actual sleeping and resending.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::NetworkKind;
use crate::resilience::backoff::calculate_backoff;

/// Statuses worth another attempt: the request may simply have hit a
/// transient condition.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// What went wrong with an attempt, as the policy sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFailure {
    /// No response at all.
    NoResponse(NetworkKind),
    /// A response arrived with this non-2xx status.
    Status(u16),
}

/// Outcome of a policy consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn fail() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide whether the attempt after `retry_count` completed retries
    /// should happen, and how long to wait first.
    pub fn decide(&self, failure: &RequestFailure, retry_count: u32) -> RetryDecision {
        if retry_count >= self.config.max_retries {
            return RetryDecision::fail();
        }

        let eligible = match failure {
            RequestFailure::NoResponse(kind) => matches!(
                kind,
                NetworkKind::Timeout | NetworkKind::Connect | NetworkKind::Dns
            ),
            RequestFailure::Status(status) => RETRYABLE_STATUSES.contains(status),
        };

        if !eligible {
            return RetryDecision::fail();
        }

        RetryDecision {
            retry: true,
            delay: calculate_backoff(
                retry_count + 1,
                self.config.base_delay_ms,
                self.config.max_delay_ms,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig::default())
    }

    #[test]
    fn test_transport_failures_retried() {
        for kind in [NetworkKind::Timeout, NetworkKind::Connect, NetworkKind::Dns] {
            let decision = policy().decide(&RequestFailure::NoResponse(kind), 0);
            assert!(decision.retry, "{kind:?} should be retried");
            assert_eq!(decision.delay, Duration::from_millis(1_000));
        }
    }

    #[test]
    fn test_unclassified_transport_failure_not_retried() {
        let decision = policy().decide(&RequestFailure::NoResponse(NetworkKind::Other), 0);
        assert!(!decision.retry);
    }

    #[test]
    fn test_retryable_statuses() {
        for status in RETRYABLE_STATUSES {
            assert!(policy().decide(&RequestFailure::Status(status), 0).retry);
        }
    }

    #[test]
    fn test_client_errors_fail_immediately() {
        for status in [400, 401, 403, 404, 409, 422] {
            let decision = policy().decide(&RequestFailure::Status(status), 0);
            assert!(!decision.retry, "{status} must not be retried");
        }
    }

    #[test]
    fn test_budget_exhaustion() {
        let failure = RequestFailure::Status(503);
        assert!(policy().decide(&failure, 2).retry);
        assert!(!policy().decide(&failure, 3).retry);
        assert!(!policy().decide(&failure, 10).retry);
    }

    #[test]
    fn test_delays_follow_backoff_schedule() {
        let mut config = RetryConfig::default();
        config.max_retries = 6;
        let policy = RetryPolicy::new(config);
        let failure = RequestFailure::Status(503);

        let delays: Vec<u64> = (0..5)
            .map(|count| policy.decide(&failure, count).delay.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000]);
    }
}
