//! Spawning and stopping a single worker through the RPC surface (`oj`),
//! and the boundary case of an unrecognized role.

use crate::prelude::*;

fn project_with_prompts() -> Project {
    let project = Project::empty();
    project.file("prompts/dev.md", "Write good code and ship it.");
    project
}

#[test]
fn spawn_then_stop_round_trips_through_running() {
    let daemon = Project::empty();
    daemon.start_daemon();
    let work = project_with_prompts();

    let spawned = daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).passes();
    let worker = json(&spawned);
    assert_eq!(worker["status"], "running");
    assert_eq!(worker["role"], "dev");
    let worker_id = worker["id"].as_str().expect("worker id").to_string();
    let pid = worker["pid"].as_u64().expect("pid") as u32;
    assert!(pid_alive(pid), "freshly spawned worker's pid should be alive");

    let got = daemon.oj().args(&["worker", &worker_id]).passes();
    assert_eq!(json(&got)["id"], worker_id.as_str());

    let stopped = daemon.oj().args(&["stop", &worker_id]).passes();
    assert_eq!(json(&stopped)["status"], "stopped");

    let settled = wait_for(SPEC_WAIT_MAX_MS, || !pid_alive(pid));
    assert!(settled, "worker process should be gone after a graceful stop");
}

#[test]
fn stopping_an_already_stopped_worker_is_a_no_op() {
    let daemon = Project::empty();
    daemon.start_daemon();
    let work = project_with_prompts();

    let spawned = daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).passes();
    let worker_id = json(&spawned)["id"].as_str().unwrap().to_string();

    daemon.oj().args(&["stop", &worker_id]).passes();
    let second_stop = daemon.oj().args(&["stop", &worker_id]).passes();
    assert_eq!(json(&second_stop)["status"], "stopped");
}

#[test]
fn unknown_role_fails_fast_without_spawning_anything() {
    let daemon = Project::empty();
    daemon.start_daemon();
    let work = project_with_prompts();

    daemon
        .oj()
        .args(&["spawn", "wizard", work.path().to_str().unwrap()])
        .fails()
        .stderr_has("unknown role");

    let workers = daemon.oj().args(&["workers"]).passes();
    assert_eq!(json(&workers).as_array().map(Vec::len), Some(0), "no worker record should have been created");
}

#[test]
fn missing_prompt_file_reports_failed_status() {
    let daemon = Project::empty();
    daemon.start_daemon();
    // No prompts/dev.md written here, unlike project_with_prompts().
    let work = Project::empty();

    daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).fails();
}

#[test]
fn getting_an_unknown_worker_id_is_invalid_params() {
    let daemon = Project::empty();
    daemon.start_daemon();

    daemon.oj().args(&["worker", "worker-dev-doesnotexist"]).fails().stderr_has("no such worker");
}
