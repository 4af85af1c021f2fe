//! Prometheus metrics for application observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090,
//! `METRICS_PORT=0` disables it). Recording functions are safe to call
//! before or without initialization; the `metrics` facade drops the values.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `taskboard_http_requests_total` - Completed requests (label: status)
//! - `taskboard_rate_limited_total` - Requests rejected with 429
//! - `taskboard_rate_limit_evictions_total` - Client buckets evicted (label: cause)
//! - `taskboard_auth_failures_total` - Rejected bearer tokens (label: reason)
//! - `taskboard_key_refresh_total` - Key set fetches (label: outcome)
//! - `taskboard_panics_recovered_total` - Handler panics turned into 500s
//!
//! ## Histograms
//! - `taskboard_request_duration_seconds` - Request duration (label: status)
//!
//! ## Gauges
//! - `taskboard_rate_limit_clients` - Client buckets currently tracked
//! - `taskboard_signing_keys` - Verification keys currently cached

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "taskboard_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "taskboard_request_duration_seconds";
    pub const RATE_LIMITED_TOTAL: &str = "taskboard_rate_limited_total";
    pub const RATE_LIMIT_EVICTIONS_TOTAL: &str = "taskboard_rate_limit_evictions_total";
    pub const RATE_LIMIT_CLIENTS: &str = "taskboard_rate_limit_clients";
    pub const AUTH_FAILURES_TOTAL: &str = "taskboard_auth_failures_total";
    pub const KEY_REFRESH_TOTAL: &str = "taskboard_key_refresh_total";
    pub const SIGNING_KEYS: &str = "taskboard_signing_keys";
    pub const PANICS_RECOVERED_TOTAL: &str = "taskboard_panics_recovered_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Returns
///
/// `Ok(())` if initialization succeeds, `Err` with message otherwise.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::HTTP_REQUESTS_TOTAL, "Total number of completed HTTP requests");
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Total number of requests rejected by the rate limiter"
    );
    describe_counter!(
        names::RATE_LIMIT_EVICTIONS_TOTAL,
        "Total number of client buckets evicted from the rate limiter"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of rejected bearer tokens"
    );
    describe_counter!(names::KEY_REFRESH_TOTAL, "Total number of signing key set fetches");
    describe_counter!(
        names::PANICS_RECOVERED_TOTAL,
        "Total number of handler panics converted to 500 responses"
    );

    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );

    describe_gauge!(
        names::RATE_LIMIT_CLIENTS,
        "Number of client buckets tracked by the rate limiter"
    );
    describe_gauge!(names::SIGNING_KEYS, "Number of cached signing keys");

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Request Metrics
// =============================================================================

/// Record a completed request.
pub fn record_request(status: u16, latency: Duration) {
    let status = status.to_string();
    counter!(names::HTTP_REQUESTS_TOTAL, "status" => status.clone()).increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "status" => status).record(latency.as_secs_f64());
}

/// Record a recovered handler panic.
pub fn record_panic_recovered() {
    counter!(names::PANICS_RECOVERED_TOTAL).increment(1);
}

// =============================================================================
// Rate Limiter Metrics
// =============================================================================

/// Record a request rejected with 429.
pub fn record_rate_limited() {
    counter!(names::RATE_LIMITED_TOTAL).increment(1);
}

/// Record evicted client buckets. `cause` is "idle" or "capacity".
pub fn record_rate_limit_evictions(cause: &'static str, count: usize) {
    counter!(names::RATE_LIMIT_EVICTIONS_TOTAL, "cause" => cause).increment(count as u64);
}

/// Update the tracked-clients gauge.
pub fn set_rate_limit_clients(count: usize) {
    gauge!(names::RATE_LIMIT_CLIENTS).set(count as f64);
}

// =============================================================================
// Authentication Metrics
// =============================================================================

/// Record a rejected bearer token.
pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record a key set fetch attempt.
pub fn record_key_refresh(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(names::KEY_REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

/// Update the cached-keys gauge.
pub fn set_signing_keys(count: usize) {
    gauge!(names::SIGNING_KEYS).set(count as f64);
}
