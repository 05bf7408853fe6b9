//! Heartbeat protocol: a per-worker file the child touches with the current
//! timestamp, single-writer (the worker) / single-reader (the manager).
//!
//! The file content is ISO-8601, matching the timestamp format the real
//! child worker writes (`datetime.now().isoformat()`, no UTC offset) —
//! not an epoch integer. Everywhere else in this crate that tracks time
//! (worker records, the store's timestamp columns) stays plain epoch
//! seconds; only this on-disk contract with the child needs the textual
//! format.

use chrono::{Local, NaiveDateTime, TimeZone};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Write an ISO-8601 timestamp (local time, no offset) to `path`, creating
/// parent directories as needed. Called by the Worker Manager once right
/// after spawn to seed an initial heartbeat, matching what the child itself
/// will do thereafter.
pub fn write_heartbeat(path: &Path, epoch_secs: i64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let stamp = Local.timestamp_opt(epoch_secs, 0).single().unwrap_or_else(Local::now);
    let mut f = std::fs::File::create(path)?;
    write!(f, "{}", stamp.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f"))?;
    Ok(())
}

/// Read a heartbeat file's ISO-8601 timestamp as epoch seconds. `None` means
/// "never beat" (file absent or unparseable) rather than an error.
pub fn read_heartbeat(path: &Path) -> Option<i64> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_iso8601(contents.trim())
}

/// Parses both offset-aware timestamps (`+00:00`/`Z` suffixed) and the bare
/// local-time form `datetime.now().isoformat()` produces, with or without
/// fractional seconds.
fn parse_iso8601(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            if let Some(local) = Local.from_local_datetime(&naive).single() {
                return Some(local.timestamp());
            }
        }
    }
    None
}

/// Age of the heartbeat at `path` relative to `now_epoch_secs`, or `None` if
/// there is no heartbeat yet.
pub fn heartbeat_age_secs(path: &Path, now_epoch_secs: i64) -> Option<i64> {
    read_heartbeat(path).map(|beat| (now_epoch_secs - beat).max(0))
}

pub fn remove_heartbeat(path: &Path) {
    let _ = std::fs::remove_file(path);
}

pub fn now_epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
