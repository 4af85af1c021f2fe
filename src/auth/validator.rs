use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};

use super::claims::{TokenClaims, UserClaims};
use super::error::AuthError;
use super::jwks::KeyCache;

/// RSA signature algorithms accepted for bearer tokens.
pub const SUPPORTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Verifies bearer tokens against keys from a [`KeyCache`].
///
/// Checks, in order: header structure and algorithm, key id, signature,
/// issuer (when configured), expiry. The audience claim is not checked.
pub struct TokenValidator {
    keys: Arc<KeyCache>,
    issuer: Option<String>,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeyCache>, issuer: Option<String>) -> Self {
        Self { keys, issuer }
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Validate a compact token and extract the caller's identity.
    pub async fn validate(&self, token: &str) -> Result<UserClaims, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        if !SUPPORTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::MissingKeyId)?;
        let key = self.keys.resolve(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        // Expiry is checked below: a token whose exp equals now is already expired
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<TokenClaims>(token, &key, &validation).map_err(map_decode_error)?;

        let exp = data.claims.expires_at().ok_or(AuthError::MissingExpiry)?;
        if exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(data.claims.into())
    }
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => AuthError::IssuerMismatch,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::Json(_) => AuthError::InvalidClaims(err.to_string()),
        _ => AuthError::MalformedToken(err.to_string()),
    }
}
