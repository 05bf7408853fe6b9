//! Shared fixtures for the integration test suite: an isolated project +
//! daemon state directory, a builder around `oj`/`ojd` invocations, and a
//! small polling helper for the async bits that aren't instant (socket
//! creation, heartbeat writes, restart backoff).

use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;

/// Generous ceiling for anything that should settle within a handful of
/// health-check ticks under the tightened test intervals below.
pub const SPEC_WAIT_MAX_MS: u64 = 8_000;

/// Poll `check` until it returns `true` or `max_ms` elapses. Returns the
/// final result either way so callers still get a useful assertion message.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return check();
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

pub fn ojd_binary() -> PathBuf {
    cargo_bin("ojd")
}

pub fn oj_binary() -> PathBuf {
    cargo_bin("oj")
}

pub fn oj() -> CommandBuilder {
    CommandBuilder::new(oj_binary())
}

/// An isolated project directory plus its own `OJ_STATE_DIR`, so tests never
/// share a daemon, a socket, or a lock file. Any `ojd` started via
/// [`Project::start_daemon`] is killed on drop if the test didn't already
/// stop it.
pub struct Project {
    root: tempfile::TempDir,
    state: tempfile::TempDir,
    daemon: RefCell<Option<Child>>,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
            state: tempfile::tempdir().expect("tempdir"),
            daemon: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_path().join("mab.sock")
    }

    pub fn git_init(&self) {
        let run = |args: &[&str]| {
            StdCommand::new("git").args(args).current_dir(self.path()).status().expect("git should run")
        };
        assert!(run(&["init", "-q"]).success());
        assert!(run(&["config", "user.email", "oj-specs@example.com"]).success());
        assert!(run(&["config", "user.name", "oj specs"]).success());
    }

    pub fn file(&self, rel: &str, contents: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }

    /// Writes a tiny executable shell script that just sleeps, standing in
    /// for the real agent CLI `OJ_AGENT_COMMAND` would otherwise name. The
    /// assembled prompt the spawner appends as a final argument lands in the
    /// script's `$1` and is never read. Returns the script's path — a single
    /// path component with no whitespace, since `OJ_AGENT_COMMAND` is split
    /// naively on whitespace.
    pub fn stand_in_agent(&self, sleep_seconds: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.state_path().join(format!("agent-{sleep_seconds}.sh"));
        std::fs::write(&path, format!("#!/bin/sh\nsleep {sleep_seconds}\n")).expect("write stand-in agent");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod stand-in agent");
        path
    }

    /// Builder for an `oj` invocation already pointed at this project's
    /// daemon via `OJ_STATE_DIR`.
    pub fn oj(&self) -> CommandBuilder {
        CommandBuilder::new(oj_binary()).env("OJ_STATE_DIR", self.state_path())
    }

    /// Start `ojd` attached (`foreground`, no double-fork) with a stand-in
    /// agent that sleeps 300s (long enough to out-survive any one test) and
    /// tightened health-check timing so dispatch/backoff tests don't need to
    /// wait on production intervals. Blocks until the RPC socket exists.
    pub fn start_daemon(&self) {
        let agent = self.stand_in_agent(300);
        self.start_daemon_with(&[("OJ_AGENT_COMMAND", agent.to_str().expect("utf8 path"))]);
    }

    /// Same as [`Project::start_daemon`] but with additional env overrides
    /// layered on top of the defaults (last write wins), e.g. a different
    /// `OJ_AGENT_COMMAND` or a tighter `OJ_HEARTBEAT_TIMEOUT_SECS`.
    pub fn start_daemon_with(&self, extra_env: &[(&str, &str)]) {
        let agent = self.stand_in_agent(300);
        let mut cmd = StdCommand::new(ojd_binary());
        cmd.arg("foreground")
            .env("OJ_STATE_DIR", self.state_path())
            .env("OJ_AGENT_COMMAND", agent.to_str().expect("utf8 path"))
            .env("OJ_HEALTH_CHECK_INTERVAL_SECS", "1")
            .env("OJ_HEARTBEAT_TIMEOUT_SECS", "30")
            .env("OJ_RESTART_BACKOFF_BASE_SECS", "1")
            .env("OJ_RESTART_BACKOFF_MAX_SECS", "2")
            .env("OJ_MAX_RESTART_COUNT", "3")
            .env("OJ_BD_SUBPROCESS_TIMEOUT_SECS", "1")
            .env("OJ_WORKER_STOP_GRACE_SECS", "2")
            .env("OJ_DISPATCH_INTERVAL_SECS", "1")
            .env("RUST_LOG", "info")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (k, v) in extra_env {
            cmd.env(k, v);
        }
        let child = cmd.spawn().expect("ojd should spawn");
        *self.daemon.borrow_mut() = Some(child);

        let socket = self.socket_path();
        assert!(wait_for(SPEC_WAIT_MAX_MS, || socket.exists()), "daemon socket never appeared at {}", socket.display());
    }

    /// Send SIGKILL directly to the daemon process, simulating a hard crash
    /// rather than a graceful `daemon.shutdown`.
    pub fn kill_daemon(&self) -> bool {
        match self.daemon.borrow_mut().take() {
            Some(mut child) => {
                let killed = child.kill().is_ok();
                let _ = child.wait();
                killed
            }
            None => false,
        }
    }

    pub fn daemon_pid(&self) -> Option<u32> {
        self.daemon.borrow().as_ref().map(|c| c.id())
    }

    pub fn daemon_log(&self) -> String {
        std::fs::read_to_string(self.state_path().join("daemon.log")).unwrap_or_default()
    }
}

/// Send SIGKILL to an arbitrary pid — used to simulate a worker crashing
/// without going through the daemon's own stop path.
pub fn kill_pid(pid: u32) {
    let _ = StdCommand::new("kill").args(["-9", &pid.to_string()]).status();
}

/// Check whether a pid is still alive (signal 0, per `kill -0`).
pub fn pid_alive(pid: u32) -> bool {
    StdCommand::new("kill").args(["-0", &pid.to_string()]).status().map(|s| s.success()).unwrap_or(false)
}

/// Parse an `oj` command's stdout as the pretty-printed JSON it always
/// prints on success.
pub fn json(captured: &Captured) -> serde_json::Value {
    serde_json::from_str(&captured.stdout()).expect("oj output should be valid json")
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(mut child) = self.daemon.borrow_mut().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// A `std::process::Command` builder with an assertion vocabulary the
/// integration tests read naturally: `.passes()` / `.fails()` followed by
/// `.stdout_has(...)` / `.stderr_has(...)`.
pub struct CommandBuilder {
    cmd: StdCommand,
}

impl CommandBuilder {
    pub fn new(bin: impl AsRef<OsStr>) -> Self {
        Self { cmd: StdCommand::new(bin) }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, val: impl AsRef<OsStr>) -> Self {
        self.cmd.env(key, val);
        self
    }

    pub fn pwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    pub fn passes(mut self) -> Captured {
        let output = self.cmd.output().expect("command should spawn");
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        Captured(output)
    }

    pub fn fails(mut self) -> Captured {
        let output = self.cmd.output().expect("command should spawn");
        assert!(
            !output.status.success(),
            "expected failure, got success\nstdout: {}",
            String::from_utf8_lossy(&output.stdout),
        );
        Captured(output)
    }
}

pub struct Captured(std::process::Output);

impl Captured {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.0.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.0.stderr).to_string()
    }

    pub fn exit_code(&self) -> i32 {
        self.0.status.code().unwrap_or(-1)
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout().contains(needle), "stdout missing {needle:?}, got: {}", self.stdout());
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr().contains(needle), "stderr missing {needle:?}, got: {}", self.stderr());
        self
    }

    pub fn stderr_lacks(self, needle: &str) -> Self {
        assert!(!self.stderr().contains(needle), "stderr unexpectedly contains {needle:?}: {}", self.stderr());
        self
    }
}
