//! Process-wide monitoring policy.

use serde::{Deserialize, Serialize};

/// The monitoring policy applied to every worker by the health-check loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// How often the health-check loop runs.
    pub health_check_interval_secs: u64,
    /// Oldest acceptable heartbeat age before a running worker is declared crashed.
    pub heartbeat_timeout_secs: u64,
    /// Crash-count ceiling; auto-restart is disabled once reached.
    pub max_restart_count: u32,
    /// Base delay for exponential backoff.
    pub restart_backoff_base_secs: u64,
    /// Cap for exponential backoff.
    pub restart_backoff_max_secs: u64,
    /// Global switch; when false no worker auto-restarts regardless of its
    /// own `auto_restart_enabled` flag.
    pub auto_restart_enabled: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 30,
            heartbeat_timeout_secs: 120,
            max_restart_count: 5,
            restart_backoff_base_secs: 5,
            restart_backoff_max_secs: 300,
            auto_restart_enabled: true,
        }
    }
}

impl HealthConfig {
    pub fn backoff_for(&self, crash_count: u32) -> u64 {
        crate::backoff::calculate_backoff(
            crash_count,
            self.restart_backoff_base_secs,
            self.restart_backoff_max_secs,
        )
    }
}

/// Aggregate counts produced by `WorkerManager::health_summary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub healthy_running: usize,
    pub unhealthy_running: usize,
    pub crashed: usize,
    pub total_restarts: u64,
    pub at_restart_ceiling: usize,
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
