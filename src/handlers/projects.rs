//! Project endpoints under `/api/v1/projects`.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, instrument};

use super::extract::ApiJson;
use crate::auth::UserClaims;
use crate::error::AppResult;
use crate::models::{ListQuery, Project, ProjectRequest};
use crate::state::AppState;
use crate::validation::{Pagination, parse_id, require_text};

/// List projects.
///
/// With valid `?page=P&limit=L` the response is a page object sorted newest
/// first:
///
/// ```json
/// { "data": [...], "total": 42, "page": 1, "limit": 10 }
/// ```
///
/// Otherwise the plain array of all projects is returned.
#[instrument(skip(state, caller))]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    caller: Option<Extension<UserClaims>>,
) -> AppResult<Response> {
    if let Some(Extension(claims)) = &caller {
        debug!(subject = %claims.subject, "Listing projects");
    }

    match Pagination::from_query(&query) {
        Some(pagination) => Ok(Json(state.projects.list_page(pagination).await?).into_response()),
        None => Ok(Json(state.projects.list().await?).into_response()),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let name = require_text(payload.name, "Name is required")?;
    let description = payload.description.unwrap_or_default();

    let project = state.projects.create(name, description).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Project>> {
    let id = parse_id(&id, "project")?;
    Ok(Json(state.projects.get(id).await?))
}

/// Replace a project's name and description.
///
/// A missing `description` resets it to the empty string.
#[instrument(skip(state, payload))]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ProjectRequest>,
) -> AppResult<Json<Project>> {
    let id = parse_id(&id, "project")?;
    let name = require_text(payload.name, "Name is required")?;
    let description = payload.description.unwrap_or_default();

    Ok(Json(state.projects.update(id, name, description).await?))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "project")?;
    state.projects.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
