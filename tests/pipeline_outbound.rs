//! Outbound stage tests: tracing headers, bearer attachment, demo
//! credentials, and the local rate limiter.

use serde_json::json;
use uuid::Uuid;

use dhara_client::config::Environment;
use dhara_client::{ApiError, RequestDescriptor};

mod common;
use common::{bearer_of, client_with, test_config, token_expiring_in, MockTransport, Scripted};

#[tokio::test]
async fn test_tracing_headers_are_attached() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let client = client_with(test_config(), transport.clone());

    client
        .request(RequestDescriptor::get("/services"))
        .await
        .unwrap();

    let sent = &transport.requests()[0];
    let request_id = sent
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(Uuid::parse_str(request_id).is_ok());

    assert_eq!(
        sent.headers
            .get("x-client-version")
            .and_then(|v| v.to_str().ok()),
        Some(env!("CARGO_PKG_VERSION"))
    );

    let timestamp = sent
        .headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(timestamp.parse::<u128>().is_ok());
}

#[tokio::test]
async fn test_stored_access_token_becomes_bearer() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let client = client_with(test_config(), transport.clone());
    let access = token_expiring_in(3_600);
    client
        .tokens()
        .set_tokens(&access, &token_expiring_in(86_400))
        .unwrap();

    client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap();

    assert_eq!(bearer_of(&transport.requests()[0]).as_deref(), Some(access.as_str()));
}

#[tokio::test]
async fn test_expired_access_token_is_not_attached() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let client = client_with(test_config(), transport.clone());
    client
        .tokens()
        .set_tokens(&token_expiring_in(-60), &token_expiring_in(86_400))
        .unwrap();

    client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap();

    assert_eq!(bearer_of(&transport.requests()[0]), None);
}

#[tokio::test]
async fn test_demo_token_used_outside_production() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let mut config = test_config();
    config.environment = Environment::Development;
    config.auth.demo_token = Some("demo-credential".to_string());
    let client = client_with(config, transport.clone());

    client
        .request(RequestDescriptor::get("/services"))
        .await
        .unwrap();

    assert_eq!(
        bearer_of(&transport.requests()[0]).as_deref(),
        Some("demo-credential")
    );
}

#[tokio::test]
async fn test_demo_token_refused_in_production() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let mut config = test_config();
    config.environment = Environment::Production;
    config.auth.demo_token = Some("demo-credential".to_string());
    let client = client_with(config, transport.clone());

    client
        .request(RequestDescriptor::get("/services"))
        .await
        .unwrap();

    assert_eq!(bearer_of(&transport.requests()[0]), None);
}

#[tokio::test]
async fn test_rate_limit_rejects_locally() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_ms = 60_000;
    let client = client_with(config, transport.clone());

    client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap();
    client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap();
    let err = client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::RateLimit { .. }), "got {err:?}");
    assert_eq!(transport.calls(), 2, "rejection must not reach the transport");
}

#[tokio::test]
async fn test_rate_limit_buckets_are_per_endpoint() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let mut config = test_config();
    config.rate_limit.max_requests = 1;
    let client = client_with(config, transport.clone());

    client
        .request(RequestDescriptor::get("/bookings"))
        .await
        .unwrap();
    client
        .request(RequestDescriptor::get("/reviews"))
        .await
        .unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_default_timeout_comes_from_config() {
    let transport = MockTransport::new(|_, _| Scripted::ok(json!({})));
    let mut config = test_config();
    config.timeouts.request_ms = 5_000;
    let client = client_with(config, transport.clone());

    client
        .request(RequestDescriptor::get("/services"))
        .await
        .unwrap();

    assert_eq!(
        transport.requests()[0].timeout,
        Some(std::time::Duration::from_millis(5_000))
    );
}
