//! Town: an orchestration context (a project plus configuration).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TownStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for TownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TownStatus::Stopped => "stopped",
            TownStatus::Starting => "starting",
            TownStatus::Running => "running",
            TownStatus::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

/// Determines the role -> worker-count mapping for a town. This mapping is
/// intentionally not persisted independently of the template value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TownTemplate {
    Solo,
    Pair,
    Full,
}

impl TownTemplate {
    /// Role names in workflow order for this template. Informational only —
    /// callers use this to populate `Town::workflow` at creation time.
    pub fn default_workflow(&self) -> &'static [&'static str] {
        match self {
            TownTemplate::Solo => &["dev"],
            TownTemplate::Pair => &["dev", "qa"],
            TownTemplate::Full => &["manager", "tech_lead", "dev", "qa", "reviewer"],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Town {
    pub name: String,
    pub port: u16,
    pub project_path: Option<PathBuf>,
    pub template: TownTemplate,
    pub workflow: Vec<String>,
    pub status: TownStatus,
    pub pid: Option<u32>,
    pub created_at: Option<i64>,
    pub started_at: Option<i64>,
    pub stopped_at: Option<i64>,
}

impl Town {
    pub fn new(name: impl Into<String>, port: u16, template: TownTemplate) -> Self {
        let workflow = template.default_workflow().iter().map(|s| s.to_string()).collect();
        Self {
            name: name.into(),
            port,
            project_path: None,
            template,
            workflow,
            status: TownStatus::Stopped,
            pid: None,
            created_at: None,
            started_at: None,
            stopped_at: None,
        }
    }
}

#[cfg(test)]
#[path = "town_tests.rs"]
mod tests;
