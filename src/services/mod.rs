mod project;
mod task;

pub use project::ProjectService;
pub use task::{TaskChanges, TaskService};
