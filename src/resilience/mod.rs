//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed attempt:
//!     → retry.rs (eligible? how many attempts so far?)
//!     → backoff.rs (how long to wait)
//!     → pipeline sleeps and resends, or surfaces the error
//! ```
//!
//! # Design Decisions
//! - The policy is a pure function; all I/O stays in the pipeline
//! - Only "no response" failures and a fixed status set are retryable;
//!   other 4xx surface immediately
//! - Backoff is deterministic exponential with a hard cap

pub mod backoff;
pub mod retry;

pub use backoff::calculate_backoff;
pub use retry::{RequestFailure, RetryDecision, RetryPolicy, RETRYABLE_STATUSES};
