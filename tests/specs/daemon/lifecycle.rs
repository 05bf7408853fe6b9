//! Singleton daemon lifecycle: startup creates its pid/lock/socket files, a
//! second instance refuses to start while the first holds the lock, and
//! `oj shutdown` brings it down cleanly.

use crate::prelude::*;

#[test]
fn daemon_creates_pid_lock_and_socket_files() {
    let project = Project::empty();
    project.start_daemon();

    assert!(project.state_path().join("daemon.pid").exists());
    assert!(project.state_path().join("daemon.lock").exists());
    assert!(project.socket_path().exists());
}

#[test]
fn status_reports_running_with_matching_pid() {
    let project = Project::empty();
    project.start_daemon();

    let out = project.oj().args(&["status"]).passes();
    let value = json(&out);
    assert_eq!(value["state"], "running");
    assert_eq!(value["pid"].as_u64(), project.daemon_pid().map(|p| p as u64));
}

#[test]
fn second_daemon_refuses_to_start_while_first_is_running() {
    let project = Project::empty();
    project.start_daemon();

    let agent = project.stand_in_agent(1);
    let output = std::process::Command::new(ojd_binary())
        .arg("foreground")
        .env("OJ_STATE_DIR", project.state_path())
        .env("OJ_AGENT_COMMAND", agent.to_str().unwrap())
        .output()
        .expect("second ojd should run");

    assert!(!output.status.success(), "a second daemon must not start while the first holds the lock");
    // The original daemon must be completely undisturbed by the failed attempt.
    project.oj().args(&["status"]).passes().stdout_has("\"state\": \"running\"");
}

#[test]
fn shutdown_rpc_stops_the_daemon_and_removes_the_socket() {
    let project = Project::empty();
    project.start_daemon();

    project.oj().args(&["shutdown"]).passes();

    let socket_gone = wait_for(SPEC_WAIT_MAX_MS, || !project.socket_path().exists());
    assert!(socket_gone, "socket file should be removed on clean shutdown\nlog:\n{}", project.daemon_log());
}

#[test]
fn daemon_starts_again_after_a_clean_stop() {
    let project = Project::empty();
    project.start_daemon();
    project.oj().args(&["shutdown"]).passes();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || !project.socket_path().exists()));

    // A fresh ojd in the same state dir should start cleanly once the first
    // has relinquished its lock.
    let agent = project.stand_in_agent(30);
    let mut cmd = std::process::Command::new(ojd_binary());
    cmd.arg("foreground")
        .env("OJ_STATE_DIR", project.state_path())
        .env("OJ_AGENT_COMMAND", agent.to_str().unwrap())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    let mut child = cmd.spawn().expect("ojd should spawn");
    let socket = project.socket_path();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || socket.exists()), "daemon should start again in a previously-used state dir");

    let _ = child.kill();
    let _ = child.wait();
}
