//! Singleton enforcement, pid-file ownership, and background detachment.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use fs2::FileExt;
use oj_core::fs_kind::{is_network_filesystem, FsKind};
use tracing::warn;

use crate::config::DaemonConfig;
use crate::error::LifecycleError;

/// Holds the daemon's exclusive advisory lock for the lifetime of the
/// process. Dropping it releases the lock (the OS also releases it on
/// process exit, but an explicit drop keeps shutdown deterministic).
pub struct DaemonLock {
    _file: File,
}

/// Acquire the singleton lock, write the pid file, and warn if the state
/// directory sits on a network filesystem (advisory locks are not reliable
/// there — §1 Non-goals, §5.E).
pub fn startup(config: &DaemonConfig) -> Result<DaemonLock, LifecycleError> {
    config.ensure_dirs()?;

    match is_network_filesystem(&config.state_dir) {
        FsKind::Network(kind) => warn!(
            fs_kind = kind,
            path = %config.state_dir.display(),
            "daemon state directory is on a network filesystem; advisory locks are not reliable there"
        ),
        FsKind::Local | FsKind::Unknown => {}
    }

    if let Some(pid) = read_pid_file(&config.pid_file())? {
        if process_exists(pid) {
            return Err(LifecycleError::AlreadyRunning(pid));
        }
        // Stale pid file from a prior crash; clean it up and proceed.
        let _ = std::fs::remove_file(config.pid_file());
    }

    let lock_path = config.lock_file();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| LifecycleError::LockFailed(lock_path.clone(), e))?;
    file.try_lock_exclusive().map_err(|e| LifecycleError::LockFailed(lock_path.clone(), e))?;

    write_pid_file(&config.pid_file(), std::process::id())?;

    Ok(DaemonLock { _file: file })
}

/// Release the lock and remove the pid file. Part of the shutdown sequence
/// (§4.E step 5).
pub fn shutdown(config: &DaemonConfig, lock: DaemonLock) -> Result<(), LifecycleError> {
    drop(lock);
    let _ = std::fs::remove_file(config.pid_file());
    Ok(())
}

/// Whether a daemon is currently running for this config: reads the pid
/// file and verifies the pid exists, cleaning up a stale file if not.
pub fn is_running(config: &DaemonConfig) -> Result<Option<u32>, LifecycleError> {
    match read_pid_file(&config.pid_file())? {
        Some(pid) if process_exists(pid) => Ok(Some(pid)),
        Some(_) => {
            let _ = std::fs::remove_file(config.pid_file());
            Ok(None)
        }
        None => Ok(None),
    }
}

fn read_pid_file(path: &Path) -> Result<Option<u32>, LifecycleError> {
    match File::open(path) {
        Ok(mut f) => {
            let mut contents = String::new();
            f.read_to_string(&mut contents)?;
            Ok(contents.trim().parse::<u32>().ok())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_pid_file(path: &Path, pid: u32) -> Result<(), LifecycleError> {
    let mut f = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    write!(f, "{pid}")?;
    Ok(())
}

/// Whether a pid currently belongs to a live process. Reused by the Worker
/// Manager's crash detection (§4.C) as well as singleton enforcement here.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn process_exists(_pid: u32) -> bool {
    false
}

/// Detach into the background: double-fork, start a new session, and
/// redirect standard streams to the null device. Only called when the
/// daemon is started without `--foreground`. Must run before the Tokio
/// runtime starts — forking a multi-threaded process is unsound, which is
/// exactly why this is delegated to the `daemonize` crate rather than
/// hand-rolled: it encapsulates the required `unsafe` fork/setsid/dup2
/// sequence behind a safe API, keeping `unsafe_code = "forbid"` intact for
/// the rest of this workspace.
#[cfg(unix)]
pub fn daemonize() -> Result<(), daemonize::Error> {
    daemonize::Daemonize::new().working_directory(".").start()
}
