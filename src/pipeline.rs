//! The API request pipeline as an explicit, ordered list of named stages.
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Recovery     │ ← panic → 500 text/plain
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded (only when enabled)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │       CORS       │ ← OPTIONS answered here
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Access Log    │ ← one event per completed request
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Bearer Auth    │ ← 401 if invalid (pass-through when disabled)
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! Stages are listed outermost first. [`Pipeline::apply`] layers them onto
//! a router in reverse so the first stage sees the request first.

use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::middleware::{
    AccessLogLayer, BearerAuthLayer, RateLimitLayer, RecoveryLayer, access_log_layer,
    build_cors_layer,
};
use crate::state::AppState;

/// One pipeline stage.
#[derive(Clone)]
pub enum Stage {
    Recovery(RecoveryLayer),
    RateLimit(RateLimitLayer),
    Cors(CorsLayer),
    AccessLog(AccessLogLayer),
    Auth(BearerAuthLayer),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Recovery(_) => "recovery",
            Stage::RateLimit(_) => "rate_limit",
            Stage::Cors(_) => "cors",
            Stage::AccessLog(_) => "access_log",
            Stage::Auth(_) => "auth",
        }
    }

    fn layer_onto<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Stage::Recovery(layer) => router.layer(layer),
            Stage::RateLimit(layer) => router.layer(layer),
            Stage::Cors(layer) => router.layer(layer),
            Stage::AccessLog(layer) => router.layer(layer),
            Stage::Auth(layer) => router.layer(layer),
        }
    }
}

/// Ordered stages, outermost first.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already present.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// The production pipeline for the given state.
    ///
    /// Rate limiting is omitted when disabled; auth is always present and
    /// passes requests through when no validator is configured.
    pub fn standard(state: &AppState) -> Self {
        let config = &state.config;
        let mut pipeline = Pipeline::new().with_stage(Stage::Recovery(RecoveryLayer::new()));

        if let Some(limiter) = &state.rate_limiter {
            info!(
                rps = config.rate_limit_rps,
                burst = config.rate_limit_burst,
                max_clients = config.rate_limit_max_clients,
                "Rate limiting enabled"
            );
            pipeline = pipeline.with_stage(Stage::RateLimit(RateLimitLayer::new(limiter.clone())));
        } else {
            info!("Rate limiting disabled");
        }

        let auth = BearerAuthLayer::new(state.token_validator.clone());
        if auth.is_enabled() {
            info!(issuer = ?config.auth_issuer, "Bearer authentication enabled");
        } else {
            info!("Bearer authentication disabled (AUTH_ENABLED=false)");
        }

        pipeline
            .with_stage(Stage::Cors(build_cors_layer(config)))
            .with_stage(Stage::AccessLog(access_log_layer()))
            .with_stage(Stage::Auth(auth))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wrap every route of `router` in the stages.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.stages
            .into_iter()
            .rev()
            .fold(router, |router, stage| stage.layer_onto(router))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::middleware::ClientRateLimiter;

    #[test]
    fn test_stage_names_in_order() {
        let pipeline = Pipeline::new()
            .with_stage(Stage::Recovery(RecoveryLayer::new()))
            .with_stage(Stage::Cors(build_cors_layer(&Config::default())))
            .with_stage(Stage::AccessLog(access_log_layer()))
            .with_stage(Stage::Auth(BearerAuthLayer::disabled()));

        assert_eq!(
            pipeline.stage_names(),
            vec!["recovery", "cors", "access_log", "auth"]
        );
        assert_eq!(pipeline.len(), 4);
        assert!(Pipeline::new().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_runs_before_cors() {
        let limiter = Arc::new(ClientRateLimiter::new(1, 1).unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let router = Router::new().route(
            "/thing",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "ok" }
            }),
        );
        let app = Pipeline::new()
            .with_stage(Stage::Recovery(RecoveryLayer::new()))
            .with_stage(Stage::RateLimit(RateLimitLayer::new(limiter)))
            .with_stage(Stage::Cors(build_cors_layer(&Config::default())))
            .apply(router);

        let preflight = || {
            Request::builder()
                .method("OPTIONS")
                .uri("/thing")
                .header(header::ORIGIN, "https://app.test")
                .header("x-forwarded-for", "10.1.1.1")
                .body(Body::empty())
                .unwrap()
        };

        // The first preflight spends the only token; the second is throttled
        let first = app.clone().oneshot(preflight()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(preflight()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovery_wraps_inner_stages() {
        async fn boom() -> &'static str {
            panic!("boom")
        }

        let router = Router::new()
            .route("/boom", get(boom))
            .route("/fine", get(|| async { "fine" }));
        let app = Pipeline::new()
            .with_stage(Stage::Recovery(RecoveryLayer::new()))
            .with_stage(Stage::AccessLog(access_log_layer()))
            .apply(router);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = app
            .oneshot(Request::builder().uri("/fine").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
