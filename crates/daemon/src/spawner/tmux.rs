//! Optional tmux-backed spawner: runs the worker inside a detached tmux
//! session instead of a bare PTY, so an operator can attach and watch a
//! worker live (`tmux attach -t oj-<worker_id>`). Shares the prompt and
//! worktree logic with the PTY spawner; only process lifecycle differs.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{log, prompt, worktree, ProcessHandle, ProcessInfo, SpawnRequest, Spawner};
use crate::error::SpawnerError;

pub struct TmuxSpawner {
    agent_command: Vec<String>,
}

impl TmuxSpawner {
    pub fn new(agent_command: Vec<String>) -> Self {
        Self { agent_command }
    }

    fn session_name(worker_id: &str) -> String {
        format!("oj-{worker_id}")
    }
}

struct TmuxHandle {
    session: String,
    pid: u32,
    log_path: std::path::PathBuf,
}

#[async_trait]
impl ProcessHandle for TmuxHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn try_wait(&self) -> Option<i32> {
        let alive = Command::new("tmux")
            .args(["has-session", "-t", &self.session])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);
        if alive {
            None
        } else {
            Some(0)
        }
    }

    async fn request_stop(&self) -> std::io::Result<()> {
        // tmux has no graceful-signal primitive of its own; the worker's
        // prompt is responsible for winding down cleanly before the
        // grace period in `Spawner::terminate` expires.
        Ok(())
    }

    async fn kill(&self) -> std::io::Result<()> {
        let _ = Command::new("tmux")
            .args(["kill-session", "-t", &self.session])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(())
    }

    async fn finalize_log(&self, reason: &str) {
        let total = std::fs::metadata(&self.log_path).map(|m| m.len()).unwrap_or(0);
        let _ = log::write_end_marker(&self.log_path, total, reason);
    }
}

#[async_trait]
impl Spawner for TmuxSpawner {
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

        let started_at = crate::heartbeat::now_epoch_secs();
        let log_path = log::log_path(req.logs_dir, req.worker_id, started_at);
        log::write_header(&log_path, req.worker_id, req.role.as_str(), req.project_path).map_err(SpawnerError::Io)?;

        let session = Self::session_name(req.worker_id);
        let (program, args) = self
            .agent_command
            .split_first()
            .ok_or_else(|| SpawnerError::Launch("agent_command is empty".to_string()))?;

        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .args(["new-session", "-d", "-s", &session, "-c"])
            .arg(run_dir)
            .arg(program)
            .args(args)
            .arg(&assembled)
            .envs(&req.env)
            .env("WORKER_WORKING_DIR", run_dir.display().to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(wt) = &worktree_info {
            tmux_cmd.env("WORKER_WORKTREE", wt.path.display().to_string());
            tmux_cmd.env("WORKER_BRANCH", &wt.branch);
        }
        let status = tmux_cmd.status().await.map_err(SpawnerError::Io)?;
        if !status.success() {
            if let Some(wt) = &worktree_info {
                worktree::remove(req.project_path, wt).await;
            }
            return Err(SpawnerError::Launch(format!("tmux new-session exited with {status}")));
        }

        // tmux's own output goes to the pane; pipe it into the log with
        // `pipe-pane` so the worker's log file matches the PTY spawner's.
        let _ = Command::new("tmux")
            .args(["pipe-pane", "-t", &session, "-o"])
            .arg(format!("cat >> '{}'", log_path.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let pid = Self::pane_pid(&session).await.ok_or_else(|| SpawnerError::Launch("could not read pane pid".to_string()))?;

        let info = ProcessInfo { pid, log_path: log_path.clone(), started_at, worktree: worktree_info };
        let handle = TmuxHandle { session, pid, log_path };
        Ok((info, Box::new(handle)))
    }
}

impl TmuxSpawner {
    async fn pane_pid(session: &str) -> Option<u32> {
        let output = Command::new("tmux")
            .args(["list-panes", "-t", session, "-F", "#{pane_pid}"])
            .output()
            .await
            .ok()?;
        String::from_utf8_lossy(&output.stdout).trim().lines().next()?.parse().ok()
    }
}

