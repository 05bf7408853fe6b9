//! Crash detection via a real SIGKILL on the worker process, the
//! auto-restart that follows, and the restart-ceiling boundary that
//! eventually disables it.

use crate::prelude::*;

fn project_with_prompts() -> Project {
    let project = Project::empty();
    project.file("prompts/dev.md", "Write good code and ship it.");
    project
}

fn worker_json(project: &Project, worker_id: &str) -> serde_json::Value {
    json(&project.oj().args(&["worker", worker_id]).passes())
}

#[test]
fn killed_worker_is_detected_crashed_and_auto_restarted() {
    let daemon = Project::empty();
    daemon.start_daemon();
    let work = project_with_prompts();

    let spawned = daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).passes();
    let first = json(&spawned);
    let worker_id = first["id"].as_str().unwrap().to_string();
    let first_pid = first["pid"].as_u64().unwrap() as u32;

    kill_pid(first_pid);

    let restarted = wait_for(SPEC_WAIT_MAX_MS, || {
        let w = worker_json(&daemon, &worker_id);
        w["status"] == "running" && w["pid"].as_u64() != Some(first_pid as u64)
    });
    assert!(restarted, "worker should be detected crashed and respawned with a new pid\nlog:\n{}", daemon.daemon_log());

    let current = worker_json(&daemon, &worker_id);
    assert_eq!(current["crash_count"].as_u64(), Some(1));
    assert!(current["last_restart_at"].is_number());

    let new_pid = current["pid"].as_u64().unwrap() as u32;
    assert!(pid_alive(new_pid));
    kill_pid(new_pid);
}

#[test]
fn restart_ceiling_disables_auto_restart() {
    let daemon = Project::empty();
    daemon.start_daemon_with(&[("OJ_MAX_RESTART_COUNT", "2")]);
    let work = project_with_prompts();

    let spawned = daemon.oj().args(&["spawn", "dev", work.path().to_str().unwrap()]).passes();
    let worker_id = json(&spawned)["id"].as_str().unwrap().to_string();
    let mut last_pid = json(&spawned)["pid"].as_u64().unwrap() as u32;

    // Two crashes are allowed to restart; kill the worker twice and follow
    // the pid changing each time.
    for _ in 0..2 {
        kill_pid(last_pid);
        let respawned = wait_for(SPEC_WAIT_MAX_MS, || {
            let w = worker_json(&daemon, &worker_id);
            w["status"] == "running" && w["pid"].as_u64() != Some(last_pid as u64)
        });
        assert!(respawned, "worker should restart below the ceiling\nlog:\n{}", daemon.daemon_log());
        last_pid = worker_json(&daemon, &worker_id)["pid"].as_u64().unwrap() as u32;
    }

    // The third crash reaches the ceiling: no further restart, auto-restart
    // turned off, and the reason recorded.
    kill_pid(last_pid);
    let ceiling_hit = wait_for(SPEC_WAIT_MAX_MS, || {
        let w = worker_json(&daemon, &worker_id);
        w["status"] == "crashed" && w["auto_restart_enabled"] == false
    });
    assert!(ceiling_hit, "restart ceiling should stop further restarts\nlog:\n{}", daemon.daemon_log());

    let final_state = worker_json(&daemon, &worker_id);
    assert!(final_state["error_message"].as_str().unwrap_or_default().contains("restart ceiling"));

    // Give it a health-check cycle to make sure it really does stay down.
    std::thread::sleep(std::time::Duration::from_secs(2));
    let still_down = worker_json(&daemon, &worker_id);
    assert_eq!(still_down["status"], "crashed");
}
