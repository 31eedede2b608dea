//! Request-level limits on the router, per tier

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;

use crate::api::test_utils::{
    bearer, create_test_app_state_with_config, create_test_server, test_config_builder,
    DEMO_TOKEN, OUTLET_TOKEN,
};

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

async fn create_test_app_with_rate_limiting(
    enabled: bool,
    requests_per_minute: i64,
    burst_size: i64,
) -> TestServer {
    let mut builder = test_config_builder()
        .set_override("api.rate_limiting.enabled", enabled)
        .unwrap();
    for tier in ["storefront", "campaigns"] {
        builder = builder
            .set_override(
                format!("api.rate_limiting.{tier}.requests_per_minute"),
                requests_per_minute,
            )
            .unwrap()
            .set_override(format!("api.rate_limiting.{tier}.burst_size"), burst_size)
            .unwrap();
    }

    let (state, _) = create_test_app_state_with_config(builder.build().unwrap()).await;
    create_test_server(state)
}

async fn post_challenge(server: &TestServer, ip: &'static str) -> StatusCode {
    server
        .post("/api/v1/storefront/challenge")
        .add_header(AUTHORIZATION, bearer(DEMO_TOKEN))
        .add_header(FORWARDED_FOR, HeaderValue::from_static(ip))
        .json(&json!({ "sessionId": "sess-1" }))
        .await
        .status_code()
}

async fn list_campaigns(server: &TestServer, token: &str) -> StatusCode {
    server
        .get("/api/v1/campaigns")
        .add_header(AUTHORIZATION, bearer(token))
        .await
        .status_code()
}

#[tokio::test]
async fn test_rate_limiting_disabled_allows_unlimited_requests() {
    let server = create_test_app_with_rate_limiting(false, 60, 1).await;

    for _ in 0..20 {
        assert_eq!(post_challenge(&server, "203.0.113.7").await, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_storefront_rate_limiting_per_ip() {
    let server = create_test_app_with_rate_limiting(true, 60, 1).await;

    assert_eq!(post_challenge(&server, "203.0.113.7").await, StatusCode::OK);
    assert_eq!(
        post_challenge(&server, "203.0.113.7").await,
        StatusCode::TOO_MANY_REQUESTS,
        "Second request from the same IP should be rate limited"
    );
    assert_eq!(post_challenge(&server, "198.51.100.2").await, StatusCode::OK);
}

#[tokio::test]
async fn test_campaign_rate_limiting_per_token() {
    let server = create_test_app_with_rate_limiting(true, 60, 2).await;

    for _ in 0..2 {
        assert_eq!(list_campaigns(&server, DEMO_TOKEN).await, StatusCode::OK);
    }
    assert_eq!(
        list_campaigns(&server, DEMO_TOKEN).await,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(list_campaigns(&server, OUTLET_TOKEN).await, StatusCode::OK);
}

#[tokio::test]
async fn test_tiers_have_independent_limits() {
    let server = create_test_app_with_rate_limiting(true, 60, 1).await;

    post_challenge(&server, "203.0.113.7").await;
    assert_eq!(
        post_challenge(&server, "203.0.113.7").await,
        StatusCode::TOO_MANY_REQUESTS
    );

    assert_eq!(list_campaigns(&server, DEMO_TOKEN).await, StatusCode::OK);
    // Health is never limited
    server.get("/api/v1/health").await.assert_status_ok();
    server.get("/api/v1/health").await.assert_status_ok();
}

#[test]
fn test_replenish_period() {
    use popgate_core::settings::rate_limiting::TierConfig;
    use std::time::Duration;

    let tier = |rpm| TierConfig {
        requests_per_minute: rpm,
        burst_size: 1,
    };
    assert_eq!(super::replenish_period(&tier(60)), Duration::from_secs(1));
    assert_eq!(super::replenish_period(&tier(120)), Duration::from_millis(500));
    assert_eq!(super::replenish_period(&tier(1)), Duration::from_secs(60));
    assert_eq!(super::replenish_period(&tier(0)), Duration::from_secs(60));
    assert_eq!(super::replenish_period(&tier(120_000)), Duration::from_millis(1));
}
