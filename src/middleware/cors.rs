//! Cross-origin header injection built on `tower_http::cors`.
//!
//! # Origin Matching
//!
//! | Allow-list entry | Matches |
//! |------------------|---------|
//! | `*` | any origin (echoed back, never a literal `*`) |
//! | `https://app.example.com` | exactly that origin |
//! | `*.example.com` | any origin ending in `.example.com` |
//!
//! Preflight (`OPTIONS`) requests are answered directly with an empty
//! success response and never reach the inner service, whether or not the
//! origin is allowed. A disallowed origin simply gets no
//! `Access-Control-Allow-Origin` header.

use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};
use tracing::warn;

use crate::config::Config;

/// Build the CORS layer from configuration.
///
/// Invalid method or header names are skipped with a warning; configuration
/// validation rejects the combinations `tower_http` would refuse at runtime.
pub fn build_cors_layer(config: &Config) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin(&config.cors_allowed_origins))
        .allow_methods(allow_methods(&config.cors_allowed_methods))
        .allow_headers(allow_headers(&config.cors_allowed_headers))
        .allow_credentials(config.cors_allow_credentials);

    if !config.cors_exposed_headers.is_empty() {
        layer = layer.expose_headers(expose_headers(&config.cors_exposed_headers));
    }

    if !config.cors_max_age.is_zero() {
        layer = layer.max_age(config.cors_max_age);
    }

    layer
}

/// Whether `origin` matches any allow-list entry.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| {
        if entry == "*" {
            return true;
        }
        if let Some(domain) = entry.strip_prefix('*') {
            // "*.example.com" keeps the leading dot, so "evilexample.com" fails
            return domain.starts_with('.') && origin.ends_with(domain);
        }
        entry == origin
    })
}

fn allow_origin(allowed: &[String]) -> AllowOrigin {
    let allowed: Arc<[String]> = allowed.into();
    AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .is_ok_and(|origin| origin_allowed(origin, &allowed))
    })
}

fn allow_methods(methods: &[String]) -> AllowMethods {
    if methods.iter().any(|m| m == "*") {
        return AllowMethods::any();
    }

    let parsed: Vec<Method> = methods
        .iter()
        .filter_map(|m| match Method::from_bytes(m.to_ascii_uppercase().as_bytes()) {
            Ok(method) => Some(method),
            Err(_) => {
                warn!(method = %m, "Invalid method in CORS_ALLOWED_METHODS, skipping");
                None
            }
        })
        .collect();
    AllowMethods::list(parsed)
}

fn parse_header_names(names: &[String], source: &'static str) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|h| match HeaderName::from_bytes(h.as_bytes()) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %h, source, "Invalid header name in CORS configuration, skipping");
                None
            }
        })
        .collect()
}

fn allow_headers(headers: &[String]) -> AllowHeaders {
    if headers.iter().any(|h| h == "*") {
        return AllowHeaders::any();
    }
    AllowHeaders::list(parse_header_names(headers, "CORS_ALLOWED_HEADERS"))
}

fn expose_headers(headers: &[String]) -> ExposeHeaders {
    if headers.iter().any(|h| h == "*") {
        return ExposeHeaders::any();
    }
    ExposeHeaders::list(parse_header_names(headers, "CORS_EXPOSED_HEADERS"))
}
