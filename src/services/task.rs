use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewTask, Task, TaskStatus};
use crate::storage::TaskRepository;

/// Partial update of a task. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl TaskChanges {
    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(description) = self.description {
            task.description = description;
        }
    }
}

/// Task operations on top of a [`TaskRepository`].
#[derive(Clone)]
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, task), fields(project_id = %task.project_id))]
    pub async fn create(&self, task: NewTask) -> AppResult<Task> {
        let task = self.repo.insert(task).await?;
        info!(task_id = %task.id, status = %task.status, "Task created");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<Task> {
        Ok(self.repo.find_by_id(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> AppResult<Vec<Task>> {
        Ok(self.repo.find_all().await?)
    }

    #[instrument(skip(self))]
    pub async fn list_for_project(&self, project_id: Uuid) -> AppResult<Vec<Task>> {
        Ok(self.repo.find_by_project_id(project_id).await?)
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: TaskChanges) -> AppResult<Task> {
        let mut task = self.repo.find_by_id(id).await?;
        changes.apply(&mut task);

        let task = self.repo.update(task).await?;
        info!(task_id = %task.id, status = %task.status, "Task updated");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        info!(task_id = %id, "Task deleted");
        Ok(())
    }
}
