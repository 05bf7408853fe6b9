//! Resolution of the daemon's state directory and the handful of `OJ_*`
//! overrides that let an operator (or a test) tune the daemon without a
//! config file.
//!
//! Precedence: `OJ_STATE_DIR` env var, then `XDG_STATE_HOME/mab`, then
//! `~/.mab`. This is the one place the daemon's state-directory location
//! becomes an explicit value, threaded through [`DaemonConfig`] rather than
//! read ad hoc wherever a path is needed.

use std::path::PathBuf;
use std::time::Duration;

pub fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OJ_STATE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("mab");
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".mab")
}

/// The agent command line, e.g. `["claude", "-p"]`. Overridable via
/// `OJ_AGENT_COMMAND`, a whitespace-separated argv (no shell quoting
/// supported — if you need quoting, wrap the real command in a script and
/// point `OJ_AGENT_COMMAND` at that).
pub fn resolve_agent_command() -> Vec<String> {
    match std::env::var("OJ_AGENT_COMMAND") {
        Ok(s) if !s.trim().is_empty() => s.split_whitespace().map(str::to_string).collect(),
        _ => vec!["claude".to_string(), "-p".to_string()],
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|s| match s.as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}

pub fn override_health_config(mut health: oj_core::HealthConfig) -> oj_core::HealthConfig {
    if let Some(v) = env_u64("OJ_HEALTH_CHECK_INTERVAL_SECS") {
        health.health_check_interval_secs = v;
    }
    if let Some(v) = env_u64("OJ_HEARTBEAT_TIMEOUT_SECS") {
        health.heartbeat_timeout_secs = v;
    }
    if let Some(v) = env_u64("OJ_MAX_RESTART_COUNT") {
        health.max_restart_count = v as u32;
    }
    if let Some(v) = env_u64("OJ_RESTART_BACKOFF_BASE_SECS") {
        health.restart_backoff_base_secs = v;
    }
    if let Some(v) = env_u64("OJ_RESTART_BACKOFF_MAX_SECS") {
        health.restart_backoff_max_secs = v;
    }
    if let Some(v) = env_bool("OJ_AUTO_RESTART_ENABLED") {
        health.auto_restart_enabled = v;
    }
    health
}

pub fn resolve_duration_secs(name: &str, default: Duration) -> Duration {
    env_u64(name).map(Duration::from_secs).unwrap_or(default)
}
