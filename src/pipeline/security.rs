//! Request/response security checks.
//!
//! Both checks are observe-only: suspicious request content and integrity
//! mismatches are logged, never blocked. Blocking belongs to the server;
//! the client's job is to leave a trail.

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::transport::RawResponse;

/// Substrings that suggest injection attempts in outgoing payloads.
const INJECTION_PATTERNS: [&str; 6] = [
    "<script",
    "javascript:",
    "onerror=",
    "onload=",
    "<iframe",
    "data:text/html",
];

/// Walk the body and log any string field matching an injection pattern.
/// Returns how many fields matched (log-only, the request proceeds).
pub fn scan_body(request_id: Uuid, body: &Value) -> usize {
    let mut matched = 0;
    scan_value(request_id, "$", body, &mut matched);
    matched
}

fn scan_value(request_id: Uuid, field: &str, value: &Value, matched: &mut usize) {
    match value {
        Value::String(s) => {
            let lowered = s.to_lowercase();
            if INJECTION_PATTERNS.iter().any(|p| lowered.contains(p)) {
                *matched += 1;
                let sample: String = s.chars().take(100).collect();
                tracing::warn!(
                    request_id = %request_id,
                    field,
                    sample,
                    "suspicious content in request body"
                );
            }
        }
        Value::Object(map) => {
            for (key, nested) in map {
                scan_value(request_id, key, nested, matched);
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_value(request_id, field, item, matched);
            }
        }
        _ => {}
    }
}

/// Compare the declared integrity digest (hex SHA-256 of the canonical
/// body) against the received payload. Returns false and logs on mismatch;
/// returns true when the header is absent or matches.
pub fn verify_integrity(request_id: Uuid, response: &RawResponse, header: &str) -> bool {
    let Some(declared) = response.header(header) else {
        return true;
    };

    let actual = hex::encode(Sha256::digest(response.body.to_string().as_bytes()));
    if actual.eq_ignore_ascii_case(declared) {
        return true;
    }

    tracing::error!(
        request_id = %request_id,
        declared,
        actual,
        "response integrity digest mismatch"
    );
    false
}
