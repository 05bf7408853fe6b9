//! PTY-backed spawner: the default way to run a worker. Allocates a
//! pseudo-terminal pair, execs the agent command with the slave as its
//! stdio, and streams the master side to the worker's log file on a
//! dedicated OS thread (portable-pty's reader is synchronous).

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, PtySize};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use super::{log, prompt, worktree, ProcessHandle, ProcessInfo, SpawnRequest, Spawner};
use crate::error::SpawnerError;

/// Grace period after spawn during which an immediate exit is treated as a
/// launch failure rather than a normal (if unusually fast) completion.
const IMMEDIATE_EXIT_PROBE: Duration = Duration::from_millis(300);

pub struct PtySpawner {
    agent_command: Vec<String>,
}

impl PtySpawner {
    pub fn new(agent_command: Vec<String>) -> Self {
        Self { agent_command }
    }
}

struct PtyHandle {
    pid: u32,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    copier: Option<std::thread::JoinHandle<std::io::Result<u64>>>,
    log_path: PathBuf,
}

#[async_trait]
impl ProcessHandle for PtyHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn try_wait(&self) -> Option<i32> {
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        child.try_wait().ok().flatten().and_then(|status| status.exit_code().try_into().ok())
    }

    async fn request_stop(&self) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(std::io::Error::from)
    }

    async fn kill(&self) -> std::io::Result<()> {
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        child.kill()
    }

    async fn finalize_log(&self, reason: &str) {
        let total = std::fs::metadata(&self.log_path).map(|m| m.len()).unwrap_or(0);
        let _ = log::write_end_marker(&self.log_path, total, reason);
    }
}

#[async_trait]
impl Spawner for PtySpawner {
    async fn spawn(&self, req: SpawnRequest<'_>) -> Result<(ProcessInfo, Box<dyn ProcessHandle>), SpawnerError> {
        let instructions = prompt::read_role_instructions(req.project_path, req.role)?;
        let assembled = prompt::assemble_prompt(req.role, &instructions, req.bead_id);

        let worktree_info = if req.worktree_enabled && worktree::is_git_checkout(req.project_path).await {
            let branch_name = req.bead_id.unwrap_or(req.worker_id);
            Some(worktree::create(req.project_path, req.worker_id, branch_name).await.map_err(SpawnerError::Io)?)
        } else {
            None
        };
        let run_dir = worktree_info.as_ref().map(|w| w.path.as_path()).unwrap_or(req.project_path);

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows: 50, cols: 200, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| SpawnerError::Launch(e.to_string()))?;

        let (program, args) = self
            .agent_command
            .split_first()
            .ok_or_else(|| SpawnerError::Launch("agent_command is empty".to_string()))?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.arg(&assembled);
        cmd.cwd(run_dir);
        for (key, value) in &req.env {
            cmd.env(key, value);
        }
        cmd.env("WORKER_WORKING_DIR", run_dir.display().to_string());
        if let Some(wt) = &worktree_info {
            cmd.env("WORKER_WORKTREE", wt.path.display().to_string());
            cmd.env("WORKER_BRANCH", &wt.branch);
        }

        let mut child = pair.slave.spawn_command(cmd).map_err(|e| SpawnerError::Launch(e.to_string()))?;
        // The slave fd is only needed by the child; dropping our copy lets
        // the master see EOF once the child itself closes it.
        drop(pair.slave);

        let pid = child.process_id().ok_or_else(|| SpawnerError::Launch("child reported no pid".to_string()))?;

        let started_at = crate::heartbeat::now_epoch_secs();
        let log_path = log::log_path(req.logs_dir, req.worker_id, started_at);
        log::write_header(&log_path, req.worker_id, req.role.as_str(), req.project_path).map_err(SpawnerError::Io)?;

        let mut reader = pair.master.try_clone_reader().map_err(|e| SpawnerError::Launch(e.to_string()))?;
        let copier_log_path = log_path.clone();
        let copier = std::thread::spawn(move || copy_sync(&mut reader, &copier_log_path));

        tokio::time::sleep(IMMEDIATE_EXIT_PROBE).await;
        if let Ok(Some(status)) = child.try_wait() {
            let exit_code = status.exit_code().try_into().ok();
            let _ = copier.join();
            let _ = log::write_end_marker(&log_path, 0, "immediate_exit");
            if let Some(wt) = &worktree_info {
                worktree::remove(req.project_path, wt).await;
            }
            return Err(SpawnerError::ImmediateExit(exit_code));
        }

        let info = ProcessInfo { pid, log_path: log_path.clone(), started_at, worktree: worktree_info };
        let handle = PtyHandle { pid, child: Mutex::new(child), copier: Some(copier), log_path };
        Ok((info, Box::new(handle)))
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if let Some(copier) = self.copier.take() {
            let _ = copier.join();
        }
    }
}

fn copy_sync(reader: &mut Box<dyn Read + Send>, log_path: &std::path::Path) -> std::io::Result<u64> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    std::io::copy(reader, &mut file)
}
