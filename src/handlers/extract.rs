//! Request extractors with the API's error format.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections render as `{"error": "..."}` with a
/// sanitized message instead of axum's plain-text body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
