use oj_core::{Role, WorkerStatus};
use std::path::PathBuf;

/// Optional filters for `list_workers` / `count_workers`. All fields default
/// to "no filter"; any combination may be set at once (conjunctive).
#[derive(Debug, Clone, Default)]
pub struct WorkerFilter {
    pub status: Option<WorkerStatus>,
    pub role: Option<Role>,
    pub project_path: Option<PathBuf>,
    pub town: Option<String>,
}

impl WorkerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn with_town(mut self, town: impl Into<String>) -> Self {
        self.town = Some(town.into());
        self
    }
}
