use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewProject, Project, ProjectPage};
use crate::storage::ProjectRepository;
use crate::validation::Pagination;

/// Project operations on top of a [`ProjectRepository`].
#[derive(Clone)]
pub struct ProjectService {
    repo: Arc<dyn ProjectRepository>,
}

impl ProjectService {
    pub fn new(repo: Arc<dyn ProjectRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, description))]
    pub async fn create(&self, name: String, description: String) -> AppResult<Project> {
        let project = self.repo.insert(NewProject { name, description }).await?;
        info!(project_id = %project.id, "Project created");
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<Project> {
        Ok(self.repo.find_by_id(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> AppResult<Vec<Project>> {
        Ok(self.repo.find_all().await?)
    }

    #[instrument(skip(self))]
    pub async fn list_page(&self, pagination: Pagination) -> AppResult<ProjectPage> {
        let (data, total) = self
            .repo
            .find_all_paginated(pagination.limit, pagination.offset())
            .await?;

        Ok(ProjectPage {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Replace name and description. `createdAt` is kept, `updatedAt` bumped.
    #[instrument(skip(self, description))]
    pub async fn update(&self, id: Uuid, name: String, description: String) -> AppResult<Project> {
        let mut project = self.repo.find_by_id(id).await?;
        project.name = name;
        project.description = description;

        let project = self.repo.update(project).await?;
        info!(project_id = %project.id, "Project updated");
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::storage::MemoryProjectRepository;

    fn service() -> ProjectService {
        ProjectService::new(Arc::new(MemoryProjectRepository::new()))
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let svc = service();
        let created = svc.create("Alpha".into(), "first".into()).await.unwrap();

        let updated = svc
            .update(created.id, "Beta".into(), String::new())
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Beta");
        assert_eq!(updated.description, "");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let err = service()
            .update(Uuid::new_v4(), "x".into(), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_page_reports_request() {
        let svc = service();
        for i in 0..3 {
            svc.create(format!("p{i}"), String::new()).await.unwrap();
        }

        let page = svc
            .list_page(Pagination { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 2);
        assert_eq!(page.data.len(), 1);
    }
}
