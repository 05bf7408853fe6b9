//! Subsystem error types. Each derives `thiserror::Error`; the RPC layer
//! converts once via `From<...> for RpcError` instead of scattering
//! match-to-code logic across handlers.

use oj_wire::RpcError;

#[derive(Debug, thiserror::Error)]
pub enum SpawnerError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("missing prompt file: {0}")]
    MissingPrompt(std::path::PathBuf),
    #[error("failed to launch process: {0}")]
    Launch(String),
    #[error("child exited immediately during startup (exit code {0:?})")]
    ImmediateExit(Option<i32>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("worker not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Spawn(#[from] SpawnerError),
    #[error("storage error: {0}")]
    Storage(#[from] oj_storage::StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("daemon is not running")]
    NotRunning,
    #[error("failed to acquire lock at {0}: {1}")]
    LockFailed(std::path::PathBuf, std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpawnerError> for RpcError {
    fn from(e: SpawnerError) -> Self {
        match e {
            SpawnerError::UnknownRole(_) => RpcError::invalid_params(e.to_string()),
            other => RpcError::internal_error(other.to_string()),
        }
    }
}

impl From<ManagerError> for RpcError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::NotFound(_) => RpcError::invalid_params(e.to_string()),
            ManagerError::Spawn(inner) => inner.into(),
            ManagerError::Storage(_) => RpcError::internal_error(e.to_string()),
        }
    }
}

impl From<LifecycleError> for RpcError {
    fn from(e: LifecycleError) -> Self {
        RpcError::internal_error(e.to_string())
    }
}
