//! The dispatch loop: skips calling out to `bd` entirely while a live
//! worker already covers a (project, role) pair, and does call it on each
//! tick once that pair is empty.

use crate::prelude::*;
use std::path::PathBuf;

/// Writes a stand-in `bd` on PATH that appends one byte to `$BD_CALL_MARKER`
/// per invocation and reports no ready work, so we can count how many times
/// the dispatcher actually shelled out.
fn fake_bd_bin_dir(project: &Project) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let bin_dir = project.state_path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let bd_path = bin_dir.join("bd");
    std::fs::write(&bd_path, "#!/bin/sh\nprintf '.' >> \"$BD_CALL_MARKER\"\necho '[]'\n").unwrap();
    std::fs::set_permissions(&bd_path, std::fs::Permissions::from_mode(0o755)).unwrap();
    bin_dir
}

fn path_with_fake_bd(bin_dir: &PathBuf) -> String {
    format!("{}:{}", bin_dir.display(), std::env::var("PATH").unwrap_or_default())
}

fn bd_call_count(marker: &std::path::Path) -> usize {
    std::fs::metadata(marker).map(|m| m.len() as usize).unwrap_or(0)
}

#[test]
fn dispatch_calls_bd_repeatedly_when_no_worker_covers_the_role() {
    let daemon = Project::empty();
    let bin_dir = fake_bd_bin_dir(&daemon);
    let marker = daemon.state_path().join("bd-calls.marker");
    daemon.start_daemon_with(&[
        ("PATH", &path_with_fake_bd(&bin_dir)),
        ("BD_CALL_MARKER", marker.to_str().unwrap()),
        ("OJ_DISPATCH_INTERVAL_SECS", "1"),
    ]);
    let work = Project::empty();
    work.file("prompts/dev.md", "be a dev");

    daemon
        .oj()
        .args(&["dispatch-start", work.path().to_str().unwrap(), "--roles", "dev", "--interval-seconds", "1"])
        .passes();

    let called_twice = wait_for(SPEC_WAIT_MAX_MS, || bd_call_count(&marker) >= 2);
    assert!(called_twice, "dispatcher should poll bd at least twice\nlog:\n{}", daemon.daemon_log());
}

#[test]
fn dispatch_skips_bd_entirely_while_a_live_worker_covers_the_role() {
    let daemon = Project::empty();
    let bin_dir = fake_bd_bin_dir(&daemon);
    let marker = daemon.state_path().join("bd-calls.marker");
    daemon.start_daemon_with(&[
        ("PATH", &path_with_fake_bd(&bin_dir)),
        ("BD_CALL_MARKER", marker.to_str().unwrap()),
        ("OJ_DISPATCH_INTERVAL_SECS", "1"),
    ]);
    let work = Project::empty();
    work.file("prompts/dev.md", "be a dev");

    // A worker is already running for (work, dev) before dispatch starts.
    daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).passes();

    daemon
        .oj()
        .args(&["dispatch-start", work.path().to_str().unwrap(), "--roles", "dev", "--interval-seconds", "1"])
        .passes();

    // Give it several ticks worth of time, then confirm bd was never shelled out to.
    std::thread::sleep(std::time::Duration::from_secs(3));
    assert_eq!(bd_call_count(&marker), 0, "dispatcher must not call bd while a live worker already covers the role");
}

#[test]
fn dispatch_stop_halts_further_polling() {
    let daemon = Project::empty();
    let bin_dir = fake_bd_bin_dir(&daemon);
    let marker = daemon.state_path().join("bd-calls.marker");
    daemon.start_daemon_with(&[
        ("PATH", &path_with_fake_bd(&bin_dir)),
        ("BD_CALL_MARKER", marker.to_str().unwrap()),
        ("OJ_DISPATCH_INTERVAL_SECS", "1"),
    ]);
    let work = Project::empty();
    work.file("prompts/dev.md", "be a dev");

    daemon
        .oj()
        .args(&["dispatch-start", work.path().to_str().unwrap(), "--roles", "dev", "--interval-seconds", "1"])
        .passes();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || bd_call_count(&marker) >= 1));

    daemon.oj().args(&["dispatch-stop"]).passes();
    let count_at_stop = bd_call_count(&marker);
    std::thread::sleep(std::time::Duration::from_secs(2));
    assert_eq!(bd_call_count(&marker), count_at_stop, "no further polling once dispatch is stopped");
}

#[test]
fn dispatch_picks_the_highest_priority_bead_and_assigns_the_single_task_prompt() {
    let daemon = Project::empty();
    let bin_dir = daemon.state_path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    // Highest priority first, exactly how `bd ready` is expected to already
    // sort its output (§4.D: "first" is "highest priority").
    std::fs::write(
        bin_dir.join("bd"),
        "#!/bin/sh\necho '[{\"id\": \"bead-A\", \"priority\": 1}, {\"id\": \"bead-B\", \"priority\": 2}]'\n",
    )
    .unwrap();
    std::fs::set_permissions(bin_dir.join("bd"), std::os::unix::fs::PermissionsExt::from_mode(0o755)).unwrap();

    daemon.start_daemon_with(&[("PATH", &format!("{}:{}", bin_dir.display(), std::env::var("PATH").unwrap_or_default()))]);
    let work = Project::empty();
    work.file("prompts/dev.md", "be a dev");

    daemon
        .oj()
        .args(&["dispatch-start", work.path().to_str().unwrap(), "--roles", "dev", "--interval-seconds", "1"])
        .passes();

    let spawned = wait_for(SPEC_WAIT_MAX_MS, || {
        let workers = json(&daemon.oj().args(&["workers"]).passes());
        workers.as_array().map(|a| !a.is_empty()).unwrap_or(false)
    });
    assert!(spawned, "dispatch should have spawned exactly one worker\nlog:\n{}", daemon.daemon_log());

    let workers = json(&daemon.oj().args(&["workers"]).passes());
    let workers = workers.as_array().unwrap();
    assert_eq!(workers.len(), 1, "dispatch should spawn exactly one worker per iteration for an idle role");
    assert_eq!(workers[0]["bead_id"], "bead-A", "the highest-priority bead should be the one assigned");
}

#[test]
fn dispatch_status_reports_enabled_state() {
    let daemon = Project::empty();
    daemon.start_daemon();
    let work = Project::empty();

    daemon.oj().args(&["dispatch-status"]).passes().stdout_has("\"enabled\": false");

    daemon.oj().args(&["dispatch-start", work.path().to_str().unwrap()]).passes();
    daemon.oj().args(&["dispatch-status"]).passes().stdout_has("\"enabled\": true");

    daemon.oj().args(&["dispatch-stop"]).passes();
    daemon.oj().args(&["dispatch-status"]).passes().stdout_has("\"enabled\": false");
}
