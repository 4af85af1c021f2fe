//! Shared helpers for the integration tests.
#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use taskboard::auth::KeySetSource;
use taskboard::storage::Repositories;
use taskboard::{AppState, Config, build_router};

pub const ISSUER: &str = "https://sso.example.com/realms/taskboard";
pub const KEY_ID: &str = "test-key-1";
pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
pub const FOREIGN_KEY: &[u8] = include_bytes!("../fixtures/foreign_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");

/// Configuration with every optional feature off and no metrics listener.
pub fn test_config() -> Config {
    Config {
        rate_limit_enabled: false,
        auth_enabled: false,
        metrics_port: 0,
        ..Config::default()
    }
}

pub fn app_with(config: Config) -> (Router, AppState) {
    let state = AppState::new(config, Repositories::in_memory()).unwrap();
    (build_router(state.clone()), state)
}

pub fn app() -> Router {
    app_with(test_config()).0
}

pub fn app_with_keys(config: Config, source: Arc<dyn KeySetSource>) -> Router {
    let state =
        AppState::with_key_source(config, Repositories::in_memory(), Some(source)).unwrap();
    build_router(state)
}

/// Decoded response: status, headers and the body as JSON (or `Null`).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

pub async fn read(response: Response) -> TestResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    read(app.clone().oneshot(req).await.unwrap()).await
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, request(Method::GET, uri, None)).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, request(Method::POST, uri, Some(body))).await
}

pub async fn put(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, request(Method::PUT, uri, Some(body))).await
}

pub async fn delete(app: &Router, uri: &str) -> TestResponse {
    send(app, request(Method::DELETE, uri, None)).await
}

/// Create a project and return its id.
pub async fn create_project(app: &Router, name: &str) -> String {
    let response = post(app, "/api/v1/projects", json!({ "name": name })).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    response.json()["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Tokens
// =============================================================================

pub fn claims(issuer: &str, exp_offset_secs: i64) -> Value {
    json!({
        "sub": "user-42",
        "email": "grace@example.com",
        "name": "Grace",
        "azp": "taskboard-web",
        "iss": issuer,
        "exp": Utc::now().timestamp() + exp_offset_secs,
        "realm_access": { "roles": ["user"] },
    })
}

pub fn sign_with(pem: &[u8], kid: &str, claims: &Value) -> String {
    let header = Header {
        kid: Some(kid.to_string()),
        ..Header::new(Algorithm::RS256)
    };
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

/// A valid token for [`ISSUER`], signed with the fixture key.
pub fn valid_token() -> String {
    sign_with(SIGNING_KEY, KEY_ID, &claims(ISSUER, 300))
}

// =============================================================================
// Key-distribution server
// =============================================================================

/// Serve `body` with `status` at `/certs` on an ephemeral port.
pub async fn spawn_key_server(status: StatusCode, body: &'static str) -> SocketAddr {
    let router = Router::new().route(
        "/certs",
        axum::routing::get(move || async move {
            (status, [("content-type", "application/json")], body)
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
