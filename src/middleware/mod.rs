//! HTTP middleware for the API pipeline.
//!
//! Each stage is an independent tower layer that can be tested against a
//! stub service:
//!
//! - **Recovery**: panics become a plain-text 500, the server keeps serving
//! - **Rate Limiting**: per-client token buckets with a bounded client map
//! - **CORS**: allow-list origin echoing, preflight short-circuit
//! - **Access Log**: one structured event per completed request
//! - **Bearer Auth**: JWT validation, claims inserted into extensions
//!
//! # Architecture
//!
//! ```text
//! Request → Recovery → Rate Limiter → CORS → Access Log → Auth → Handler
//!              ↓            ↓           ↓                   ↓
//!           500 text    429 JSON   preflight 200        401 JSON
//! ```
//!
//! The order is fixed by [`crate::pipeline::Pipeline::standard`].

pub mod access_log;
pub mod auth;
pub mod cors;
pub mod ip;
pub mod rate_limit;
pub mod recovery;

pub use access_log::{AccessLogLayer, access_log_layer};
pub use auth::BearerAuthLayer;
pub use cors::{build_cors_layer, origin_allowed};
pub use ip::{UNKNOWN_IP, client_key, remote_addr};
pub use rate_limit::{ClientRateLimiter, RateLimitError, RateLimitLayer};
pub use recovery::RecoveryLayer;
