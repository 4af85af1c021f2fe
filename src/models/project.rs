use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project groups tasks. Identifiers and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when inserting a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
}

/// Body of `POST /api/v1/projects` and `PUT /api/v1/projects/{id}`.
///
/// `name` is kept optional here so that an absent name is reported as
/// "Name is required" rather than as a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Page of projects, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPage {
    pub data: Vec<Project>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
