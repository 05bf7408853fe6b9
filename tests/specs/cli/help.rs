//! Basic CLI ergonomics: `--help` output and behavior when no daemon is
//! reachable at all.

use crate::prelude::*;

#[test]
fn help_lists_every_subcommand() {
    let out = oj().args(&["--help"]).passes();
    let stdout = out.stdout();
    for name in ["status", "shutdown", "workers", "worker", "spawn", "stop", "health", "dispatch-start", "dispatch-stop", "dispatch-status"] {
        assert!(stdout.contains(name), "--help should mention {name}, got:\n{stdout}");
    }
}

#[test]
fn missing_subcommand_fails_with_usage() {
    oj().args(&[]).fails();
}

#[test]
fn status_against_a_missing_daemon_reports_not_running_and_exits_3() {
    let project = Project::empty();
    let result = project.oj().args(&["status"]).fails();
    assert_eq!(result.exit_code(), 3);
    result.stderr_has("daemon not running");
}

#[test]
fn worker_spawn_with_invalid_params_exits_2() {
    let daemon = Project::empty();
    daemon.start_daemon();

    let result = daemon.oj().args(&["spawn", "wizard", "/tmp"]).fails();
    assert_eq!(result.exit_code(), 2);
}
