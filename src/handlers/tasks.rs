//! Task endpoints: project-scoped listing and creation under
//! `/api/v1/projects/{id}/tasks`, single-task operations under
//! `/api/v1/tasks/{id}`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use super::extract::ApiJson;
use crate::error::{AppError, AppResult};
use crate::models::{CreateTaskRequest, NewTask, Task, UpdateTaskRequest};
use crate::services::TaskChanges;
use crate::state::AppState;
use crate::validation::{parse_id, parse_status, require_text};

#[instrument(skip(state))]
pub async fn list_project_tasks(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<Vec<Task>>> {
    let project_id = parse_id(&project_id, "project")?;
    Ok(Json(state.tasks.list_for_project(project_id).await?))
}

/// Create a task in a project.
///
/// `status` defaults to `TODO` when absent or empty. The project id is taken from the path and
/// is not checked against the project store.
#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let project_id = parse_id(&project_id, "project")?;
    let title = require_text(payload.title, "Title is required")?;
    let status = parse_status(payload.status.as_deref().filter(|s| !s.is_empty()))?
        .unwrap_or_default();

    let task = state
        .tasks
        .create(NewTask {
            project_id,
            title,
            status,
            due_date: payload.due_date,
            description: payload.description.unwrap_or_default(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let id = parse_id(&id, "task")?;
    Ok(Json(state.tasks.get(id).await?))
}

/// Partial update: only fields present in the body change.
///
/// An unknown id is reported before the body is validated. A present
/// `status` must be a known value, the empty string included.
#[instrument(skip(state, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> AppResult<Json<Task>> {
    let id = parse_id(&id, "task")?;
    state.tasks.get(id).await?;

    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("Title cannot be empty".to_string()));
    }

    let changes = TaskChanges {
        title: payload.title,
        status: parse_status(payload.status.as_deref())?,
        due_date: payload.due_date,
        description: payload.description,
    };

    Ok(Json(state.tasks.update(id, changes).await?))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "task")?;
    state.tasks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
