mod api;
mod project;
mod task;

pub use api::{HealthResponse, ListQuery};
pub use project::{NewProject, Project, ProjectPage, ProjectRequest};
pub use task::{
    CreateTaskRequest, INVALID_STATUS_MESSAGE, InvalidTaskStatus, NewTask, Task, TaskStatus,
    UpdateTaskRequest,
};
