//! Worktree isolation: a per-worker source-control checkout on a dedicated
//! branch, created before spawn and removed after stop.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
}

fn worktrees_root(project_path: &Path) -> PathBuf {
    project_path.join(".worktrees")
}

/// Whether `project_path` is a git checkout at all — worktree isolation is
/// only attempted for source-controlled projects.
pub async fn is_git_checkout(project_path: &Path) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(project_path)
        .args(["rev-parse", "--is-inside-work-tree"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Create an isolated worktree at `<project>/.worktrees/<worker_id>` on a
/// branch named from `branch_name` (the worker id, or the bead id when one
/// is assigned).
pub async fn create(project_path: &Path, worker_id: &str, branch_name: &str) -> std::io::Result<WorktreeInfo> {
    let path = worktrees_root(project_path).join(worker_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let branch = format!("worker/{branch_name}");
    let status = Command::new("git")
        .arg("-C")
        .arg(project_path)
        .args(["worktree", "add", "-b", &branch])
        .arg(&path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        return Err(std::io::Error::other(format!("git worktree add failed for {branch}")));
    }
    Ok(WorktreeInfo { path, branch })
}

/// Remove a worktree, forcibly if the polite removal fails.
pub async fn remove(project_path: &Path, worktree: &WorktreeInfo) {
    let polite = Command::new("git")
        .arg("-C")
        .arg(project_path)
        .args(["worktree", "remove"])
        .arg(&worktree.path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    let succeeded = polite.map(|s| s.success()).unwrap_or(false);
    if !succeeded {
        let _ = Command::new("git")
            .arg("-C")
            .arg(project_path)
            .args(["worktree", "remove", "--force"])
            .arg(&worktree.path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        let _ = tokio::fs::remove_dir_all(&worktree.path).await;
    }
}

/// Periodic sweep: remove worktree directories under `.worktrees/` that
/// don't correspond to any id in `live_worker_ids`.
pub async fn sweep_orphans(project_path: &Path, live_worker_ids: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let root = worktrees_root(project_path);
    let mut removed = Vec::new();
    let mut entries = match tokio::fs::read_dir(&root).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if live_worker_ids.iter().any(|id| id == name.as_ref()) {
            continue;
        }
        let path = entry.path();
        let worktree = WorktreeInfo { path: path.clone(), branch: String::new() };
        remove(project_path, &worktree).await;
        removed.push(path);
    }
    Ok(removed)
}
