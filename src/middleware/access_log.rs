//! One structured log line per completed request, via `tower_http::trace`.
//!
//! The span carries method, path and the transport peer address; the
//! response callback adds status and duration and feeds the request metrics.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, OnResponse, TraceLayer};
use tracing::{Span, info};

use super::ip::remote_addr;
use crate::metrics;

/// Concrete trace layer used as the access-log pipeline stage.
pub type AccessLogLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    AccessLogSpan,
    (),
    AccessLogOnResponse,
    (),
    (),
    (),
>;

/// Build the access-log stage.
pub fn access_log_layer() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(AccessLogSpan)
        .on_request(())
        .on_response(AccessLogOnResponse)
        .on_body_chunk(())
        .on_eos(())
        .on_failure(())
}

/// Creates the `http_request` span.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogSpan;

impl<B> MakeSpan<B> for AccessLogSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            remote_addr = %remote_addr(request),
        )
    }
}

/// Emits the access-log line once the response head is ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogOnResponse;

impl<B> OnResponse<B> for AccessLogOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();
        let duration_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

        info!(parent: span, status, duration_ms, "HTTP request");
        metrics::record_request(status, latency);
    }
}
