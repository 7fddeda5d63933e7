//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client
//! core. All types derive Serde traits for deserialization from config
//! files, and every field has a documented default so a minimal config is
//! valid.

use serde::{Deserialize, Serialize};

/// Deployment environment. Controls demo-credential eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Root configuration for the API client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL all request paths are resolved against.
    pub base_url: String,

    /// Deployment environment.
    pub environment: Environment,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Transport-level retry configuration.
    pub retries: RetryConfig,

    /// Client-side rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Authentication and refresh settings.
    pub auth: AuthConfig,

    /// Request/response security checks.
    pub security: SecurityConfig,
}

impl ClientConfig {
    /// True when the demo credential may be attached.
    pub fn demo_auth_allowed(&self) -> bool {
        self.environment != Environment::Production && self.auth.demo_token.is_some()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request ceiling in milliseconds.
    pub request_ms: u64,

    /// Dedicated ceiling for the token refresh call.
    pub refresh_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            refresh_ms: 10_000,
        }
    }
}

/// Transport-level retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial send.
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,

    /// Backoff ceiling (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

/// Client-side rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether the local limiter is consulted at all.
    pub enabled: bool,

    /// Requests allowed per window, per base path.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 60_000,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL for cached GET responses (milliseconds).
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1_000,
        }
    }
}

/// Authentication and refresh settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the token refresh endpoint, relative to `base_url`.
    pub refresh_path: String,

    /// Remaining access-token lifetime below which a proactive refresh
    /// fires (milliseconds).
    pub refresh_threshold_ms: u64,

    /// Storage key for the access token.
    pub access_token_key: String,

    /// Storage key for the refresh token.
    pub refresh_token_key: String,

    /// Fallback bearer credential for non-production environments. Ignored
    /// when `environment` is `production`.
    pub demo_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            refresh_threshold_ms: 15 * 60 * 1_000,
            access_token_key: "dhara_access_token".to_string(),
            refresh_token_key: "dhara_refresh_token".to_string(),
            demo_token: None,
        }
    }
}

/// Request/response security checks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Scan outgoing string body fields for injection patterns (log-only).
    pub scan_request_bodies: bool,

    /// Response header carrying the integrity digest, if the server
    /// declares one.
    pub integrity_header: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            scan_request_bodies: true,
            integrity_header: "x-data-integrity".to_string(),
        }
    }
}
