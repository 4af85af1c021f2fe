//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with version and uptime
//! - `GET /ready` - Readiness probe, 503 once graceful shutdown has begun
//!
//! Both sit outside the API pipeline: no rate limiting, no authentication.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z",
///   "uptimeSeconds": 3600
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// ```yaml
/// readinessProbe:
///   httpGet:
///     path: /ready
///     port: 8080
///   periodSeconds: 10
/// ```
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN")
    } else {
        (StatusCode::OK, "READY")
    }
}
