//! Client identification for rate limiting and request logging.
//!
//! # Client Key Priority
//!
//! 1. `X-Forwarded-For`: first entry of the comma-separated list
//! 2. `X-Real-IP`
//! 3. Transport peer address (IP only, port dropped) from axum's
//!    [`ConnectInfo`] extension
//! 4. [`UNKNOWN_IP`]
//!
//! Blank header values are skipped so they fall through to the next source.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **Proxy headers are trusted unconditionally.** A client that reaches the
//! service directly can pick its own rate-limit bucket by sending
//! `X-Forwarded-For`. Deploy behind a reverse proxy that overwrites these
//! headers:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! # The "unknown" Fallback
//!
//! Requests without any identifiable address (for example in-process tests
//! that skip `ConnectInfo`) share the `"unknown"` bucket.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback key when no client address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    /// First entry of X-Forwarded-For.
    FromXff(&'a str),
    /// X-Real-IP header.
    FromRealIp(&'a str),
    /// Transport peer address.
    FromPeer(IpAddr),
    /// Nothing usable.
    NotFound,
}

/// Header value, trimmed, or `None` if absent, non-UTF-8 or blank.
#[inline]
fn header_str<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[inline]
fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

#[inline]
fn extract_ip<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // Format: "client, proxy1, proxy2" - we want the first (client) entry
    if let Some(first) = header_str(req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ExtractedIp::FromXff(first);
    }

    if let Some(real_ip) = header_str(req, "x-real-ip") {
        return ExtractedIp::FromRealIp(real_ip);
    }

    match peer_ip(req) {
        Some(ip) => ExtractedIp::FromPeer(ip),
        None => ExtractedIp::NotFound,
    }
}

/// Key identifying the client for rate limiting.
///
/// Returns `Cow::Borrowed` for the shared "unknown" key so the fallback
/// path does not allocate. Call `.into_owned()` before moving into an
/// async block.
#[inline]
pub fn client_key<B>(req: &Request<B>) -> Cow<'static, str> {
    match extract_ip(req) {
        ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => Cow::Owned(ip.to_string()),
        ExtractedIp::FromPeer(ip) => Cow::Owned(ip.to_string()),
        ExtractedIp::NotFound => Cow::Borrowed(UNKNOWN_IP),
    }
}

/// Transport peer address for logs, ignoring proxy headers.
#[inline]
pub fn remote_addr<B>(req: &Request<B>) -> Cow<'static, str> {
    match peer_ip(req) {
        Some(ip) => Cow::Owned(ip.to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}
