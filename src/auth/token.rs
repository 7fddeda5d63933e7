//! JWT-shaped token inspection.
//!
//! Tokens are opaque signed strings; the client never verifies signatures,
//! it only decodes the claims segment to answer "is this still usable".
//! Decode failures therefore yield `None` rather than an error: a
//! best-effort check must not crash calling code.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ApiError;

/// Claims carried in the payload segment of a token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Claims {
    /// Subject (user id).
    #[serde(default)]
    pub sub: String,

    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: u64,

    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Structural check applied before a token is stored: three dot-separated
/// non-empty segments. Rejected tokens are never persisted.
pub fn validate_format(token: &str) -> Result<(), ApiError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ApiError::TokenFormat {
            reason: format!("expected 3 segments, found {}", segments.len()),
        });
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ApiError::TokenFormat {
            reason: "empty segment".to_string(),
        });
    }
    Ok(())
}

/// Decode the claims segment. Returns `None` on any structural or encoding
/// failure.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// True when the token is past its expiry. Undecodable tokens count as
/// expired.
pub fn is_expired(token: &str) -> bool {
    match decode_claims(token) {
        Some(claims) if claims.exp > 0 => claims.exp <= now_secs(),
        _ => true,
    }
}

/// Remaining lifetime, zero when expired or undecodable.
pub fn remaining_lifetime(token: &str) -> Duration {
    match decode_claims(token) {
        Some(claims) if claims.exp > now_secs() => Duration::from_secs(claims.exp - now_secs()),
        _ => Duration::ZERO,
    }
}

/// True when remaining lifetime is at or below the threshold. Drives
/// proactive refresh scheduling.
pub fn is_expiring_soon(token: &str, threshold: Duration) -> bool {
    remaining_lifetime(token) <= threshold
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{expiring_in, make_token};
    use super::*;

    #[test]
    fn test_decode_claims_roundtrip() {
        let token = make_token("user-42", 4_000_000_000, &["therapist"]);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert!(claims.has_role("therapist"));
        assert!(claims.has_permission("bookings:read"));
        assert!(!claims.has_permission("admin:write"));
    }

    #[test]
    fn test_decode_garbage_returns_none() {
        assert!(decode_claims("not-a-token").is_none());
        assert!(decode_claims("a.%%%.c").is_none());
        assert!(decode_claims("").is_none());
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format(&expiring_in(60)).is_ok());
        assert!(matches!(
            validate_format("onlyonesegment"),
            Err(ApiError::TokenFormat { .. })
        ));
        assert!(matches!(
            validate_format("a..c"),
            Err(ApiError::TokenFormat { .. })
        ));
        assert!(matches!(
            validate_format("a.b.c.d"),
            Err(ApiError::TokenFormat { .. })
        ));
    }

    #[test]
    fn test_expiry_queries() {
        let live = expiring_in(3_600);
        assert!(!is_expired(&live));
        assert!(!is_expiring_soon(&live, Duration::from_secs(60)));
        assert!(is_expiring_soon(&live, Duration::from_secs(7_200)));

        let dead = make_token("user-1", 1, &[]);
        assert!(is_expired(&dead));
        assert_eq!(remaining_lifetime(&dead), Duration::ZERO);

        // Undecodable tokens are treated as expired.
        assert!(is_expired("a.b.c"));
    }
}
