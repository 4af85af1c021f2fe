//! Panic recovery for the request pipeline.
//!
//! Wraps `tower_http::catch_panic` so that a panic anywhere below this stage
//! becomes a plain-text `500 Internal Server Error` while the process keeps
//! serving. The panic is logged once, inside a span carrying the request's
//! method, path and remote address, together with the panic message and a
//! stack trace.
//!
//! # Stack Traces
//!
//! By the time `catch_unwind` hands us the payload the stack has unwound, so
//! the trace is captured earlier: [`RecoveryLayer::new`] installs (once per
//! process) a panic hook that records a forced backtrace into a thread-local
//! and then defers to the previously installed hook. The responder runs on
//! the panicking thread right after unwinding and takes the trace from there.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode, header};
use tower::{Layer, Service};
use tower_http::catch_panic::{CatchPanic, CatchPanicLayer, ResponseForPanic};
use tracing::error;
use tracing::instrument::{Instrument, Instrumented};

use super::ip::remote_addr;
use crate::metrics;

/// Plain-text body returned for a recovered panic.
pub const PANIC_RESPONSE_BODY: &str = "Internal Server Error";

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = LAST_PANIC_TRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(trace);
                }
            });
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    LAST_PANIC_TRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()))
        .ok()
        .flatten()
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Turns a caught panic into the 500 response.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicResponder;

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let trace = take_panic_trace().unwrap_or_else(|| "<unavailable>".to_string());
        error!(
            panic = %panic_message(err.as_ref()),
            stack = %trace,
            "Recovered from panic while handling request"
        );
        metrics::record_panic_recovered();

        let mut response = Response::new(Body::from(PANIC_RESPONSE_BODY));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Outermost pipeline stage.
#[derive(Debug, Clone)]
pub struct RecoveryLayer {
    inner: CatchPanicLayer<PanicResponder>,
}

impl RecoveryLayer {
    pub fn new() -> Self {
        install_panic_hook();
        Self {
            inner: CatchPanicLayer::custom(PanicResponder),
        }
    }
}

impl Default for RecoveryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService {
            inner: self.inner.layer(inner),
        }
    }
}

/// Service produced by [`RecoveryLayer`].
#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: CatchPanic<S, PanicResponder>,
}

impl<S> Service<Request<Body>> for RecoveryService<S>
where
    CatchPanic<S, PanicResponder>: Service<Request<Body>>,
{
    type Response = <CatchPanic<S, PanicResponder> as Service<Request<Body>>>::Response;
    type Error = <CatchPanic<S, PanicResponder> as Service<Request<Body>>>::Error;
    type Future = Instrumented<<CatchPanic<S, PanicResponder> as Service<Request<Body>>>::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // error_span so the request context survives filters that drop info spans
        let span = tracing::error_span!(
            "recovery",
            method = %req.method(),
            path = %req.uri().path(),
            remote_addr = %remote_addr(&req),
        );

        // A panic raised synchronously by `call` is also caught by CatchPanic
        let future = span.in_scope(|| self.inner.call(req));
        future.instrument(span)
    }
}
