//! Persistence collaborators for projects and tasks.
//!
//! Handlers never touch a concrete store: they go through the repository
//! traits defined here, held as `Arc<dyn ...Repository>`. The shipped
//! implementation is the in-memory document store in [`memory`].
//!
//! # Semantics
//!
//! | Operation | Missing record |
//! |-----------|----------------|
//! | `find_by_id` | [`StorageError::NotFound`] |
//! | `update` | [`StorageError::NotFound`] |
//! | `delete` | [`StorageError::NotFound`] |
//!
//! `insert` assigns the identifier and both timestamps. `update` keeps the
//! stored `created_at` and sets `updated_at` to the current time.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewProject, NewTask, Project, Task};

pub use memory::{MemoryProjectRepository, MemoryTaskRepository};

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record with the given identifier exists.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind, e.g. "Project"
        kind: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The backing store failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        StorageError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Repository for [`Project`] records.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert(&self, project: NewProject) -> StorageResult<Project>;

    async fn update(&self, project: Project) -> StorageResult<Project>;

    async fn delete(&self, id: Uuid) -> StorageResult<()>;

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Project>;

    /// All projects, oldest first.
    async fn find_all(&self) -> StorageResult<Vec<Project>>;

    /// One page of projects, newest first, plus the total count.
    async fn find_all_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<(Vec<Project>, usize)>;
}

/// Repository for [`Task`] records.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: NewTask) -> StorageResult<Task>;

    async fn update(&self, task: Task) -> StorageResult<Task>;

    async fn delete(&self, id: Uuid) -> StorageResult<()>;

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Task>;

    /// All tasks, oldest first.
    async fn find_all(&self) -> StorageResult<Vec<Task>>;

    /// Tasks belonging to one project, oldest first.
    async fn find_by_project_id(&self, project_id: Uuid) -> StorageResult<Vec<Task>>;
}

/// The pair of repositories the service layer is built from.
#[derive(Clone)]
pub struct Repositories {
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Repositories {
    /// Fresh, empty in-memory repositories.
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(MemoryProjectRepository::new()),
            tasks: Arc::new(MemoryTaskRepository::new()),
        }
    }
}
