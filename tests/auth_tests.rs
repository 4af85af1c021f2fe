//! Bearer authentication against a key set served over HTTP.
//!
//! Each test starts a small key-distribution server on an ephemeral port and
//! points the service at it.
//!
//! Run with: `cargo test --test auth_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;

use taskboard::Config;
use taskboard::auth::{HttpKeySetSource, KeyCache, KeySetError, KeySetSource};

use common::*;

fn auth_config(jwks_url: String) -> Config {
    Config {
        auth_enabled: true,
        auth_issuer: Some(ISSUER.to_string()),
        auth_jwks_url: Some(jwks_url),
        ..test_config()
    }
}

fn key_source(url: &str) -> Arc<dyn KeySetSource> {
    Arc::new(HttpKeySetSource::new(url, Duration::from_secs(2)).unwrap())
}

async fn secured_app() -> Router {
    let addr = spawn_key_server(StatusCode::OK, JWKS).await;
    let url = format!("http://{addr}/certs");
    app_with_keys(auth_config(url.clone()), key_source(&url))
}

fn with_auth(method: Method, uri: &str, authorization: &str) -> Request<Body> {
    let mut req = request(method, uri, None);
    req.headers_mut()
        .insert(header::AUTHORIZATION, authorization.parse().unwrap());
    req
}

fn assert_unauthorized(response: &TestResponse) {
    assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", response.text);
    assert_eq!(response.json(), json!({ "error": "Unauthorized" }));
    assert_eq!(response.headers[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let app = secured_app().await;
    let bearer = format!("Bearer {}", valid_token());

    let mut create = request(
        Method::POST,
        "/api/v1/projects",
        Some(json!({ "name": "Secured" })),
    );
    create
        .headers_mut()
        .insert(header::AUTHORIZATION, bearer.parse().unwrap());
    let created = send(&app, create).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);

    let listed = send(&app, with_auth(Method::GET, "/api/v1/projects", &bearer)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_scheme_is_case_insensitive() {
    let app = secured_app().await;
    let response = send(
        &app,
        with_auth(
            Method::GET,
            "/api/v1/projects",
            &format!("bearer {}", valid_token()),
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_header_is_rejected() {
    let app = secured_app().await;
    let response = get(&app, "/api/v1/projects").await;

    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_malformed_headers_are_rejected() {
    let app = secured_app().await;
    let token = valid_token();

    for authorization in [
        format!("Basic {token}"),
        format!("Bearer{token}"),
        format!("Bearer {token} extra"),
        "Bearer not.a.jwt".to_string(),
    ] {
        let response = send(&app, with_auth(Method::GET, "/api/v1/projects", &authorization)).await;
        assert_unauthorized(&response);
    }
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = secured_app().await;
    let token = sign_with(SIGNING_KEY, KEY_ID, &claims(ISSUER, -60));

    let response = send(
        &app,
        with_auth(Method::GET, "/api/v1/projects", &format!("Bearer {token}")),
    )
    .await;
    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_issuer_mismatch_is_rejected() {
    let app = secured_app().await;
    let token = sign_with(
        SIGNING_KEY,
        KEY_ID,
        &claims("https://sso.example.com/realms/other", 300),
    );

    let response = send(
        &app,
        with_auth(Method::GET, "/api/v1/projects", &format!("Bearer {token}")),
    )
    .await;
    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_token_from_unknown_key_is_rejected() {
    let app = secured_app().await;

    // Unknown kid: the cache refreshes once and still finds nothing
    let unknown_kid = sign_with(FOREIGN_KEY, "foreign-key", &claims(ISSUER, 300));
    let response = send(
        &app,
        with_auth(
            Method::GET,
            "/api/v1/projects",
            &format!("Bearer {unknown_kid}"),
        ),
    )
    .await;
    assert_unauthorized(&response);

    // Known kid, wrong key: signature check fails
    let forged = sign_with(FOREIGN_KEY, KEY_ID, &claims(ISSUER, 300));
    let response = send(
        &app,
        with_auth(Method::GET, "/api/v1/projects", &format!("Bearer {forged}")),
    )
    .await;
    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_health_and_ready_skip_auth() {
    let app = secured_app().await;

    assert_eq!(get(&app, "/health").await.status, StatusCode::OK);
    assert_eq!(get(&app, "/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_api_route_requires_auth() {
    let app = secured_app().await;
    let response = get(&app, "/api/v1/unknown").await;

    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_key_server_failure() {
    let addr = spawn_key_server(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
    let url = format!("http://{addr}/certs");

    let cache = KeyCache::new(key_source(&url));
    let err = cache.refresh().await.unwrap_err();
    assert!(matches!(err, KeySetError::Status(500)), "{err:?}");
    assert!(cache.is_empty());

    let app = app_with_keys(auth_config(url.clone()), key_source(&url));
    let response = send(
        &app,
        with_auth(
            Method::GET,
            "/api/v1/projects",
            &format!("Bearer {}", valid_token()),
        ),
    )
    .await;
    assert_unauthorized(&response);
}

#[tokio::test]
async fn test_key_server_garbage_body() {
    let addr = spawn_key_server(StatusCode::OK, "<html>not json</html>").await;
    let url = format!("http://{addr}/certs");

    let cache = KeyCache::new(key_source(&url));
    let err = cache.refresh().await.unwrap_err();
    assert!(matches!(err, KeySetError::Decode(_)), "{err:?}");
}
