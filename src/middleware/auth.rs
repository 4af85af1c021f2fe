//! Bearer token authentication stage.
//!
//! # Usage
//!
//! Set `AUTH_ENABLED=true` and point `AUTH_JWKS_URL` at the identity
//! provider's key set. Clients then send:
//!
//! ```bash
//! curl -H "Authorization: Bearer <token>" http://localhost:8080/api/v1/projects
//! ```
//!
//! The scheme is matched case-insensitively and the header must consist of
//! exactly two space-separated parts. On success the caller's [`UserClaims`]
//! are inserted into the request extensions. Every failure becomes the same
//! `401 {"error":"Unauthorized"}`; the reason only reaches the debug log and
//! the `reason` label of the auth-failure counter.
//!
//! With auth disabled the layer is a pass-through.
//!
//! [`UserClaims`]: crate::auth::UserClaims

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode, header};
use tower::{Layer, Service};
use tracing::debug;

use crate::auth::{AuthError, TokenValidator};
use crate::error::ErrorResponse;
use crate::metrics;

/// Authentication layer. `None` validator means auth is disabled.
#[derive(Clone)]
pub struct BearerAuthLayer {
    validator: Option<Arc<TokenValidator>>,
}

impl BearerAuthLayer {
    pub fn new(validator: Option<Arc<TokenValidator>>) -> Self {
        Self { validator }
    }

    pub fn disabled() -> Self {
        Self { validator: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.validator.is_some()
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            validator: self.validator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    validator: Option<Arc<TokenValidator>>,
}

impl<S> Service<Request<Body>> for BearerAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let Some(validator) = self.validator.clone() else {
            return Box::pin(inner.call(req));
        };

        // Owned so no borrow of the request is held across the await
        let token = bearer_token(&req).map(str::to_owned);

        Box::pin(async move {
            let result = match token {
                Ok(token) => validator.validate(&token).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(claims) => {
                    debug!(subject = %claims.subject, "Bearer token accepted");
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(e) => {
                    debug!(
                        error = %e,
                        path = %req.uri().path(),
                        "Authentication failed"
                    );
                    metrics::record_auth_failure(e.reason());
                    Ok(unauthorized_response())
                }
            }
        })
    }
}

/// Token from `Authorization: Bearer <token>`.
fn bearer_token<B>(req: &Request<B>) -> Result<&str, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AuthError::InvalidHeader),
    }
}

fn unauthorized_response() -> Response<Body> {
    let mut response = ErrorResponse::into_response_with(StatusCode::UNAUTHORIZED, "Unauthorized");
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;

    use async_trait::async_trait;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{JwkSet, KeyCache, KeySetError, KeySetSource, UserClaims};

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/v1/projects");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&request(Some("Bearer abc"))).unwrap(), "abc");
        assert_eq!(bearer_token(&request(Some("bearer abc"))).unwrap(), "abc");
        assert_eq!(bearer_token(&request(Some("BEARER abc"))).unwrap(), "abc");

        assert!(matches!(
            bearer_token(&request(None)),
            Err(AuthError::MissingHeader)
        ));
        for bad in ["Bearer", "Basic abc", "Bearer a b", "Bearer  abc", "abc"] {
            assert!(
                matches!(bearer_token(&request(Some(bad))), Err(AuthError::InvalidHeader)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let layer = BearerAuthLayer::disabled();
        assert!(!layer.is_enabled());

        let svc = layer.layer(tower::service_fn(|req: Request<Body>| async move {
            assert!(req.extensions().get::<UserClaims>().is_none());
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let response = svc.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    struct EmptySource;

    #[async_trait]
    impl KeySetSource for EmptySource {
        async fn fetch(&self) -> Result<JwkSet, KeySetError> {
            Ok(JwkSet { keys: Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_rejects_before_handler() {
        let cache = Arc::new(KeyCache::new(Arc::new(EmptySource)));
        let validator = Arc::new(TokenValidator::new(cache, None));
        let layer = BearerAuthLayer::new(Some(validator));
        assert!(layer.is_enabled());

        // A teapot response would mean the handler ran
        let svc = layer.layer(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::IM_A_TEAPOT)
                    .body(Body::empty())
                    .unwrap(),
            )
        }));

        for auth in [None, Some("Basic abc"), Some("Bearer not-a-token")] {
            let response = svc.clone().oneshot(request(auth)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body, serde_json::json!({"error": "Unauthorized"}));
        }
    }
}
