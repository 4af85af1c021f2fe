pub mod docs;
mod extract;
mod health;
mod projects;
mod tasks;

use axum::response::{IntoResponse, Response};

use crate::error::AppError;

pub use docs::{docs_redirect, openapi_document};
pub use extract::ApiJson;
pub use health::{health_check, readiness_check};
pub use projects::{create_project, delete_project, get_project, list_projects, update_project};
pub use tasks::{create_task, delete_task, get_task, list_project_tasks, update_task};

/// Fallback for unknown paths under `/api`.
pub async fn not_found() -> Response {
    AppError::NotFound("Route not found".to_string()).into_response()
}
