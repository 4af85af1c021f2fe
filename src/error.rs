use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::storage::StorageError;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Status Mapping
///
/// - `BadRequest` - 400, message shown to the client
/// - `Unauthorized` - 401, detail logged but never echoed
/// - `NotFound` - 404, message shown to the client (also used for update and
///   delete of records that do not exist)
/// - `Storage`, `Internal`, `ConfigError` - 500 with a generic message
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints: `{"error": "<message>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Build a JSON error response with the given status.
    pub fn into_response_with(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            axum::Json(ErrorResponse {
                error: message.into(),
            }),
        )
            .into_response()
    }
}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Internal(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Full detail stays in the logs; clients only see sanitized messages
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let message = match self {
            AppError::BadRequest(msg) | AppError::NotFound(msg) => msg,
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::Storage(_) | AppError::Internal(_) => {
                "An internal error occurred. Please try again later.".to_string()
            }
            AppError::ConfigError(_) => "Service configuration error.".to_string(),
        };

        ErrorResponse::into_response_with(status, message)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, .. } => AppError::NotFound(format!("{kind} not found")),
            StorageError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(sanitize_json_error(&rejection.body_text()))
    }
}

/// Sanitize JSON body errors to avoid leaking internal type information.
///
/// Deserialization errors can contain internal struct/field names which
/// shouldn't be exposed to external clients. This extracts the useful parts.
fn sanitize_json_error(msg: &str) -> String {
    if msg.contains("missing field")
        && let Some(start) = msg.find('`')
        && let Some(end) = msg[start + 1..].find('`')
    {
        let field = &msg[start + 1..start + 1 + end];
        return format!("Missing required field: {field}");
    }

    if msg.contains("unknown variant") || msg.contains("invalid type") {
        return "Invalid data type in request body".to_string();
    }

    if msg.contains("Content-Type") {
        return "Expected request with `Content-Type: application/json`".to_string();
    }

    "Invalid request body".to_string()
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
