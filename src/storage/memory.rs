//! In-memory document store.
//!
//! Records live in a [`HashMap`] behind a [`parking_lot::RwLock`]; no lock is
//! held across an await point. Data is lost when the process exits.
//!
//! Cloning a repository shares the underlying map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ProjectRepository, StorageError, StorageResult, TaskRepository};
use crate::models::{NewProject, NewTask, Project, Task};

const PROJECT: &str = "Project";
const TASK: &str = "Task";

/// In-memory [`ProjectRepository`].
#[derive(Clone, Default)]
pub struct MemoryProjectRepository {
    data: Arc<RwLock<HashMap<Uuid, Project>>>,
}

impl MemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn insert(&self, project: NewProject) -> StorageResult<Project> {
        let now = Utc::now();
        let stored = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            created_at: now,
            updated_at: now,
        };

        self.data.write().insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, project: Project) -> StorageResult<Project> {
        let mut data = self.data.write();
        let existing = data
            .get_mut(&project.id)
            .ok_or_else(|| StorageError::not_found(PROJECT, project.id))?;

        existing.name = project.name;
        existing.description = project.description;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.data
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(PROJECT, id))
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Project> {
        self.data
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(PROJECT, id))
    }

    async fn find_all(&self) -> StorageResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.data.read().values().cloned().collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn find_all_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> StorageResult<(Vec<Project>, usize)> {
        let mut projects: Vec<Project> = self.data.read().values().cloned().collect();
        let total = projects.len();

        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let page = projects.into_iter().skip(offset).take(limit).collect();

        Ok((page, total))
    }
}

/// In-memory [`TaskRepository`].
#[derive(Clone, Default)]
pub struct MemoryTaskRepository {
    data: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        tasks
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn insert(&self, task: NewTask) -> StorageResult<Task> {
        let now = Utc::now();
        let stored = Task {
            id: Uuid::new_v4(),
            project_id: task.project_id,
            title: task.title,
            status: task.status,
            due_date: task.due_date,
            description: task.description,
            created_at: now,
            updated_at: now,
        };

        self.data.write().insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, task: Task) -> StorageResult<Task> {
        let mut data = self.data.write();
        let existing = data
            .get_mut(&task.id)
            .ok_or_else(|| StorageError::not_found(TASK, task.id))?;

        existing.project_id = task.project_id;
        existing.title = task.title;
        existing.status = task.status;
        existing.due_date = task.due_date;
        existing.description = task.description;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.data
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(TASK, id))
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Task> {
        self.data
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(TASK, id))
    }

    async fn find_all(&self) -> StorageResult<Vec<Task>> {
        let tasks = self.data.read().values().cloned().collect();
        Ok(Self::sorted(tasks))
    }

    async fn find_by_project_id(&self, project_id: Uuid) -> StorageResult<Vec<Task>> {
        let tasks = self
            .data
            .read()
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        Ok(Self::sorted(tasks))
    }
}
