use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Reasons a bearer token is rejected.
///
/// Every variant surfaces to the client as the same generic 401; the
/// detail only reaches the logs and the `reason` metric label.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("invalid Authorization header format")]
    InvalidHeader,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("token header has no key id")]
    MissingKeyId,

    #[error("no signing key with id '{0}'")]
    KeyNotFound(String),

    #[error("failed to refresh signing keys: {0}")]
    KeyRefresh(#[from] KeySetError),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token has no expiry")]
    MissingExpiry,

    #[error("token expired")]
    Expired,

    #[error("invalid token claims: {0}")]
    InvalidClaims(String),
}

impl AuthError {
    /// Short, stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::InvalidHeader => "invalid_header",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::MissingKeyId => "missing_kid",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::KeyRefresh(_) => "key_refresh_failed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::MissingExpiry | AuthError::Expired => "expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
        }
    }
}

/// Failures fetching the key set from the key-distribution endpoint.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("key set endpoint returned status {0}")]
    Status(u16),

    #[error("key set response could not be decoded: {0}")]
    Decode(String),
}
