//! Tests for the middleware pipeline as mounted by `build_router`.
//!
//! Run with: `cargo test --test pipeline_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use taskboard::Config;

use common::*;

fn limited_config(burst: u32) -> Config {
    Config {
        rate_limit_enabled: true,
        rate_limit_rps: 1,
        rate_limit_burst: burst,
        ..test_config()
    }
}

fn from_client(method: Method, uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_after_burst() {
    let (app, _state) = app_with(limited_config(2));

    for _ in 0..2 {
        let response = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.1")).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.1")).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.error(),
        "Rate limit exceeded. Please try again later."
    );

    let retry_after: u64 = response.headers["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    assert_eq!(response.headers["x-ratelimit-limit"], "1");
    assert_eq!(response.headers["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_rate_limit_keys_are_independent() {
    let (app, _state) = app_with(limited_config(1));

    let first = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.1")).await;
    let second = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.2")).await;
    let repeat = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.1")).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(repeat.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_forwarded_chain_uses_first_entry() {
    let (app, _state) = app_with(limited_config(1));

    let first = send(
        &app,
        from_client(Method::GET, "/api/v1/projects", "10.0.0.7, 192.168.0.1"),
    )
    .await;
    let same_client = send(
        &app,
        from_client(Method::GET, "/api/v1/projects", "10.0.0.7, 192.168.0.2"),
    )
    .await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(same_client.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let (app, _state) = app_with(limited_config(1));

    for _ in 0..5 {
        let response = send(&app, from_client(Method::GET, "/health", "10.0.0.1")).await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_rate_limiting_disabled() {
    let app = app();

    for _ in 0..30 {
        let response = send(&app, from_client(Method::GET, "/api/v1/projects", "10.0.0.1")).await;
        assert_eq!(response.status, StatusCode::OK);
    }
}

// =============================================================================
// CORS
// =============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/projects")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let app = app();
    let response = send(&app, preflight("https://app.example.com")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.is_empty());
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    let methods = response.headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn test_preflight_with_restricted_origins() {
    let (app, _state) = app_with(Config {
        cors_allowed_origins: vec!["*.example.com".to_string()],
        ..test_config()
    });

    let allowed = send(&app, preflight("https://app.example.com")).await;
    assert_eq!(
        allowed.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );

    let denied = send(&app, preflight("https://evil.test")).await;
    assert_eq!(denied.status, StatusCode::OK);
    assert!(
        denied
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_simple_request_gets_cors_headers() {
    let (app, _state) = app_with(Config {
        cors_exposed_headers: vec!["X-Total-Count".to_string()],
        ..test_config()
    });

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/projects")
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase(),
        "x-total-count"
    );
}

#[tokio::test]
async fn test_preflight_is_rate_limited_first() {
    let (app, _state) = app_with(limited_config(1));

    let mut first = preflight("https://app.example.com");
    first
        .headers_mut()
        .insert("x-forwarded-for", "10.0.0.9".parse().unwrap());
    let mut second = preflight("https://app.example.com");
    second
        .headers_mut()
        .insert("x-forwarded-for", "10.0.0.9".parse().unwrap());

    assert_eq!(send(&app, first).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, second).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}
