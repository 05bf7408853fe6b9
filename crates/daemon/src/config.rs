//! Explicit configuration struct passed at daemon construction: one
//! `DaemonConfig` built once at startup rather than scattered global state.

use oj_core::HealthConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// The daemon's state directory (`~/.mab` by default).
    pub state_dir: PathBuf,
    pub health: HealthConfig,
    pub rpc_request_timeout: Duration,
    pub rpc_idle_timeout: Duration,
    pub worker_stop_grace: Duration,
    pub bd_subprocess_timeout: Duration,
    pub dispatch_interval: Duration,
    pub client_pool_size: usize,
    /// The child agent runtime, e.g. `["claude", "-p"]`. The assembled
    /// prompt is appended as the final argument. What the command actually
    /// is is out of scope here; the daemon only needs something to exec.
    pub agent_command: Vec<String>,
}

impl DaemonConfig {
    /// Builds defaults, then applies any `OJ_*` overrides present in the
    /// environment. Each field is independently overridable; unset ones
    /// keep their hardcoded default.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            health: crate::env::override_health_config(HealthConfig::default()),
            rpc_request_timeout: crate::env::resolve_duration_secs("OJ_RPC_REQUEST_TIMEOUT_SECS", Duration::from_secs(30)),
            rpc_idle_timeout: crate::env::resolve_duration_secs("OJ_RPC_IDLE_TIMEOUT_SECS", Duration::from_secs(60)),
            worker_stop_grace: crate::env::resolve_duration_secs("OJ_WORKER_STOP_GRACE_SECS", Duration::from_secs(30)),
            bd_subprocess_timeout: crate::env::resolve_duration_secs("OJ_BD_SUBPROCESS_TIMEOUT_SECS", Duration::from_secs(5)),
            dispatch_interval: crate::env::resolve_duration_secs("OJ_DISPATCH_INTERVAL_SECS", Duration::from_secs(30)),
            client_pool_size: 3,
            agent_command: crate::env::resolve_agent_command(),
        }
    }

    /// Helper constructor supplying the default `~/.mab` location.
    pub fn default_location() -> Self {
        Self::new(crate::env::resolve_state_dir())
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join("daemon.pid")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("daemon.lock")
    }

    pub fn log_file(&self) -> PathBuf {
        self.state_dir.join("daemon.log")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("mab.sock")
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("workers.db")
    }

    pub fn heartbeat_dir(&self) -> PathBuf {
        self.state_dir.join("heartbeat")
    }

    pub fn heartbeat_file(&self, worker_id: &str) -> PathBuf {
        self.heartbeat_dir().join(format!("{worker_id}.heartbeat"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn worktrees_dir(project_path: &Path) -> PathBuf {
        project_path.join(".worktrees")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::create_dir_all(self.heartbeat_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
