//! The Spawner abstraction: launches and terminates a child process with an
//! attached PTY (primary) or inside a terminal multiplexer session
//! (optional, platform-dependent).

mod log;
pub mod prompt;
mod pty;
mod tmux;
pub mod worktree;

pub use pty::PtySpawner;
pub use tmux::TmuxSpawner;
pub use worktree::WorktreeInfo;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use oj_core::Role;

use crate::error::SpawnerError;

/// What the Worker Manager records about a freshly-spawned process.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub log_path: PathBuf,
    pub started_at: i64,
    pub worktree: Option<WorktreeInfo>,
}

/// Parameters for one spawn call.
pub struct SpawnRequest<'a> {
    pub role: Role,
    pub project_path: &'a Path,
    pub worker_id: &'a str,
    pub env: HashMap<String, String>,
    pub bead_id: Option<&'a str>,
    pub worktree_enabled: bool,
    pub logs_dir: &'a Path,
}

/// A live handle to a spawned process: whatever the Spawner needs to poll,
/// signal, and forcibly kill its child, plus join its output copier. Exposed
/// as a trait so `Spawner::terminate` can be one shared default method
/// instead of each implementation re-deriving the same stop sequence.
#[async_trait]
pub trait ProcessHandle: Send {
    fn pid(&self) -> u32;
    /// Non-blocking exit check.
    async fn try_wait(&self) -> Option<i32>;
    /// Ask the child to stop on its own terms (SIGTERM on Unix).
    async fn request_stop(&self) -> std::io::Result<()>;
    /// Unconditional kill (SIGKILL on Unix).
    async fn kill(&self) -> std::io::Result<()>;
    /// Finalize the log file once the process is confirmed gone.
    async fn finalize_log(&self, reason: &str);
}

#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, req: SpawnRequest<'_>) -> Result<(ProcessInfo, Box<dyn ProcessHandle>), SpawnerError>;

    /// Send a polite termination signal, wait up to `timeout`, then force
    /// termination. Returns the exit code, or `None` if the process never
    /// reported one. Identical across spawners, so it lives here rather
    /// than being duplicated per implementation.
    async fn terminate(&self, handle: Box<dyn ProcessHandle>, graceful: bool, timeout: Duration) -> Option<i32> {
        let exit = if graceful {
            let _ = handle.request_stop().await;
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if let Some(code) = handle.try_wait().await {
                    break Some(code);
                }
                if tokio::time::Instant::now() >= deadline {
                    let _ = handle.kill().await;
                    break handle.try_wait().await;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        } else {
            let _ = handle.kill().await;
            handle.try_wait().await
        };
        handle.finalize_log(if graceful { "stopped" } else { "killed" }).await;
        exit
    }
}
