//! ID generation helpers.

use crate::role::Role;

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Generate a new worker id of the form `worker-{role}-{random}`.
///
/// Minted exactly once per spawn, by the Worker Manager, before the Spawner
/// is invoked — the same string becomes both the database primary key and
/// the `WORKER_ID` value exported to the child, so the two can never diverge.
pub fn new_worker_id(role: Role) -> String {
    format!("worker-{}-{}", role.as_str(), nanoid::nanoid!(10))
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
