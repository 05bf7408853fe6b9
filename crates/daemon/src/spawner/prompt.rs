//! Prompt assembly: the spawner's one piece of business logic that must be
//! reproduced exactly. Chooses between the polling prompt and the
//! single-task prompt solely based on whether a bead id was supplied.

use oj_core::Role;
use std::path::Path;

use crate::error::SpawnerError;

/// Poll interval advertised to the child in the polling prompt (seconds).
pub const POLL_INTERVAL_SECS: u64 = 30;
/// Consecutive empty polls after which the child should exit.
pub const MAX_IDLE_POLLS: u32 = 10;

/// Read the role's instruction file from `<project>/prompts/<role>.md`.
pub fn read_role_instructions(project_path: &Path, role: Role) -> Result<String, SpawnerError> {
    let path = project_path.join("prompts").join(role.prompt_file());
    std::fs::read_to_string(&path).map_err(|_| SpawnerError::MissingPrompt(path))
}

/// Build the prompt handed to the child, choosing between the polling and
/// single-task forms based solely on `bead_id.is_some()`.
pub fn assemble_prompt(role: Role, instructions: &str, bead_id: Option<&str>) -> String {
    match bead_id {
        Some(bead) => single_task_prompt(role, instructions, bead),
        None => polling_prompt(role, instructions),
    }
}

/// Instructs the child to loop: query ready work filtered by the role's bd
/// label (or no filter for `manager`), claim one, work, close, repeat; exit
/// after `MAX_IDLE_POLLS` consecutive empty polls.
fn polling_prompt(role: Role, instructions: &str) -> String {
    let label_clause = match role.label_filter() {
        Some(label) => format!("`bd ready -l {label}`"),
        None => "`bd ready`".to_string(),
    };
    format!(
        "{instructions}\n\n\
         ---\n\
         You are a `{role}` worker operating in polling mode.\n\
         Loop:\n\
         1. Run {label_clause} to list ready work.\n\
         2. If there is work, claim the first item, complete it, then close it with `bd close`.\n\
         3. If there is no work, wait {POLL_INTERVAL_SECS} seconds and poll again.\n\
         4. After {MAX_IDLE_POLLS} consecutive polls with no work found, exit.\n\
         Never perform more than one bead per claim; always re-poll after closing one.\n"
    )
}

/// Instructs the child to perform exactly the assigned bead and then exit.
/// Never loops, never polls.
fn single_task_prompt(role: Role, instructions: &str, bead_id: &str) -> String {
    format!(
        "{instructions}\n\n\
         ---\n\
         You are a `{role}` worker assigned a single unit of work: `{bead_id}`.\n\
         Perform exactly this bead, close it with `bd close {bead_id}` when done, then exit.\n\
         Do not poll for additional work. Do not loop.\n"
    )
}
