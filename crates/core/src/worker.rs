//! Worker: a managed child process and its persisted record.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;

use crate::role::Role;

/// Unique identifier for a worker instance. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new WorkerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this WorkerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a worker's underlying OS process.
///
/// `stopped`, `crashed`, and `failed` are terminal for the process instance;
/// a restart creates a new process under the same [`WorkerId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::Crashed | WorkerStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Pending => "pending",
            WorkerStatus::Starting => "starting",
            WorkerStatus::Running => "running",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Crashed => "crashed",
            WorkerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The persisted record of a managed child process.
///
/// `status == Running` implies `pid.is_some()`, and `crash_count` never
/// exceeds the configured ceiling once `auto_restart_enabled` has been
/// forced off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub role: Role,
    pub project_path: PathBuf,
    pub town: String,
    pub status: WorkerStatus,
    pub pid: Option<u32>,

    pub created_at: i64,
    pub started_at: Option<i64>,
    pub stopped_at: Option<i64>,
    pub last_heartbeat_at: Option<i64>,
    pub last_restart_at: Option<i64>,

    pub crash_count: u32,
    pub auto_restart_enabled: bool,

    pub exit_code: Option<i32>,
    pub error_message: Option<String>,

    pub worktree_path: Option<PathBuf>,
    pub worktree_branch: Option<String>,

    pub bead_id: Option<String>,
}

impl Worker {
    /// Construct a freshly-created record in `Pending` status, as produced
    /// by the Worker Manager before the Spawner is invoked.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: WorkerId,
        role: Role,
        project_path: PathBuf,
        town: impl Into<String>,
        created_at: i64,
        auto_restart_enabled: bool,
        bead_id: Option<String>,
    ) -> Self {
        Self {
            id,
            role,
            project_path,
            town: town.into(),
            status: WorkerStatus::Pending,
            pid: None,
            created_at,
            started_at: None,
            stopped_at: None,
            last_heartbeat_at: None,
            last_restart_at: None,
            crash_count: 0,
            auto_restart_enabled,
            exit_code: None,
            error_message: None,
            worktree_path: None,
            worktree_branch: None,
            bead_id,
        }
    }

    /// Whether this worker was spawned to perform exactly one bead, as
    /// opposed to polling for work in a loop.
    pub fn is_single_task(&self) -> bool {
        self.bead_id.is_some()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
