//! Subprocess contract with the external work-queue tool (`bd`). Every
//! failure mode here — missing binary, no queue state in the project, a
//! non-zero exit, empty output, unparseable JSON — collapses to "no work
//! found" rather than an error; the dispatch loop cannot distinguish "queue
//! is empty" from "queue is unavailable," and shouldn't try to.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct ReadyBead {
    id: String,
}

/// Run `bd ready [-l <label>]` from `project_path` and return the first
/// ready bead id, if any. The queue is expected to already sort by
/// priority, so "first" is "highest priority."
pub async fn first_ready_bead(project_path: &Path, label: Option<&str>, timeout: Duration) -> Option<String> {
    let mut cmd = Command::new("bd");
    cmd.arg("ready");
    if let Some(label) = label {
        cmd.args(["-l", label]);
    }
    cmd.current_dir(project_path).stdout(Stdio::piped()).stderr(Stdio::null());

    let output = tokio::time::timeout(timeout, cmd.output()).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let beads: Vec<ReadyBead> = serde_json::from_slice(&output.stdout).ok()?;
    beads.into_iter().next().map(|b| b.id)
}
