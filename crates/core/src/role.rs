//! The closed set of worker roles and their static prompt/label tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The functional kind of a worker.
///
/// Closed set: a worker is always exactly one of these five roles, fixed at
/// compile time and not user-extensible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Dev,
    Qa,
    TechLead,
    Manager,
    Reviewer,
}

/// One row of the role configuration table: the bd label filter used by
/// both the polling prompt and the dispatcher, and the prompt file read from
/// the project's `prompts/` directory.
#[derive(Debug, Clone, Copy)]
pub struct RoleConfig {
    pub label_filter: Option<&'static str>,
    pub prompt_file: &'static str,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Dev,
        Role::Qa,
        Role::TechLead,
        Role::Manager,
        Role::Reviewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Dev => "dev",
            Role::Qa => "qa",
            Role::TechLead => "tech_lead",
            Role::Manager => "manager",
            Role::Reviewer => "reviewer",
        }
    }

    /// The static role configuration row: bd label filter + prompt filename.
    ///
    /// `manager` deliberately carries no label filter — it sees all ready
    /// work, not a role-scoped slice of it.
    pub fn config(&self) -> RoleConfig {
        match self {
            Role::Dev => RoleConfig {
                label_filter: Some("dev"),
                prompt_file: "dev.md",
            },
            Role::Qa => RoleConfig {
                label_filter: Some("qa"),
                prompt_file: "qa.md",
            },
            Role::TechLead => RoleConfig {
                label_filter: Some("architecture"),
                prompt_file: "tech_lead.md",
            },
            Role::Manager => RoleConfig {
                label_filter: None,
                prompt_file: "manager.md",
            },
            Role::Reviewer => RoleConfig {
                label_filter: Some("review"),
                prompt_file: "reviewer.md",
            },
        }
    }

    pub fn label_filter(&self) -> Option<&'static str> {
        self.config().label_filter
    }

    pub fn prompt_file(&self) -> &'static str {
        self.config().prompt_file
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Role::Dev),
            "qa" => Ok(Role::Qa),
            "tech_lead" => Ok(Role::TechLead),
            "manager" => Ok(Role::Manager),
            "reviewer" => Ok(Role::Reviewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
