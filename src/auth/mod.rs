//! Bearer token authentication.
//!
//! # Components
//!
//! - [`KeyCache`]: RSA verification keys indexed by key id, refreshed from a
//!   [`KeySetSource`] (normally [`HttpKeySetSource`]) on startup and on misses
//! - [`TokenValidator`]: verifies signature, issuer and expiry, then extracts
//!   [`UserClaims`]
//!
//! The cache is built first and handed to the validator, so tests can swap
//! in a fake key source without touching global state.

mod claims;
mod error;
mod jwks;
mod validator;

pub use claims::UserClaims;
pub use error::{AuthError, KeySetError};
pub use jwks::{HttpKeySetSource, Jwk, JwkSet, KeyCache, KeySetSource};
pub use validator::{SUPPORTED_ALGORITHMS, TokenValidator};
