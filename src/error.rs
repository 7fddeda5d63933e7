//! Error taxonomy for the client core.
//!
//! Every failure that crosses the facade boundary is one of these variants;
//! nothing in the library panics on a fallible path. The pipeline normalizes
//! raw transport and HTTP failures into this shape before handing them to
//! callers.

use serde_json::Value;
use thiserror::Error;

/// Transport-level failure classes for requests that never produced a
/// response. The distinction matters to the retry policy: all of these are
/// retry-eligible, while an error *response* is judged by its status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// The per-request deadline elapsed.
    Timeout,
    /// TCP connect was refused or reset.
    Connect,
    /// Hostname resolution failed.
    Dns,
    /// Any other failure before a response arrived.
    Other,
}

impl NetworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Timeout => "timeout",
            NetworkKind::Connect => "connect",
            NetworkKind::Dns => "dns",
            NetworkKind::Other => "other",
        }
    }
}

/// Typed error returned by the pipeline and facade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received from the server.
    #[error("network error ({})", kind.as_str())]
    Network { kind: NetworkKind, message: String },

    /// A non-2xx response was received.
    #[error("http error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// The request was rejected as unauthenticated and could not be
    /// transparently repaired (e.g. a 401 on an already-replayed request).
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Token refresh was exhausted; the session is over.
    #[error("session expired")]
    SessionExpired,

    /// The client-side rate limiter rejected the request before any
    /// network I/O.
    #[error("client rate limit exceeded for {key}")]
    RateLimit { key: String },

    /// A token failed structural validation at write time.
    #[error("malformed token: {reason}")]
    TokenFormat { reason: String },

    /// Caller-supplied input was rejected before sending. Never retried.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The call was cancelled by its owner. Facade state is reset to idle
    /// rather than error when this surfaces.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of the error response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Network { .. } => "network",
            ApiError::Http { .. } => "http",
            ApiError::Auth { .. } => "auth",
            ApiError::SessionExpired => "session_expired",
            ApiError::RateLimit { .. } => "rate_limit",
            ApiError::TokenFormat { .. } => "token_format",
            ApiError::Validation { .. } => "validation",
            ApiError::Cancelled => "cancelled",
        }
    }

    /// Build an `Http` error from a response body, pulling `message` and
    /// `details` fields out of JSON error envelopes when the server sends
    /// them.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| default_status_message(status).to_owned());
        let details = body.get("details").cloned();
        ApiError::Http {
            status,
            message,
            details,
        }
    }
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        408 => "Request timeout",
        409 => "Conflict",
        422 => "Unprocessable entity",
        429 => "Too many requests",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        504 => "Gateway timeout",
        _ => "Request failed",
    }
}
