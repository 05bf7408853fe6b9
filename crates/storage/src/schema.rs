//! Schema creation and idempotent column migration.
//!
//! At open, compare `PRAGMA table_info(<table>)` against the code's
//! expected column list and issue `ALTER TABLE ... ADD COLUMN` for anything
//! missing. Tables are created fresh on first use; existing data is never
//! dropped or rewritten.

use crate::error::Result;
use rusqlite::Connection;

/// `(column name, SQL type + default clause)`.
const WORKER_COLUMNS: &[(&str, &str)] = &[
    ("id", "TEXT PRIMARY KEY NOT NULL"),
    ("role", "TEXT NOT NULL"),
    ("project_path", "TEXT NOT NULL"),
    ("town", "TEXT NOT NULL DEFAULT 'default'"),
    ("status", "TEXT NOT NULL"),
    ("pid", "INTEGER"),
    ("created_at", "INTEGER NOT NULL"),
    ("started_at", "INTEGER"),
    ("stopped_at", "INTEGER"),
    ("last_heartbeat_at", "INTEGER"),
    ("last_restart_at", "INTEGER"),
    ("crash_count", "INTEGER NOT NULL DEFAULT 0"),
    ("auto_restart_enabled", "INTEGER NOT NULL DEFAULT 1"),
    ("exit_code", "INTEGER"),
    ("error_message", "TEXT"),
    ("worktree_path", "TEXT"),
    ("worktree_branch", "TEXT"),
    ("bead_id", "TEXT"),
];

const TOWN_COLUMNS: &[(&str, &str)] = &[
    ("name", "TEXT PRIMARY KEY NOT NULL"),
    ("port", "INTEGER NOT NULL"),
    ("project_path", "TEXT"),
    ("template", "TEXT NOT NULL"),
    ("workflow", "TEXT NOT NULL DEFAULT '[]'"),
    ("status", "TEXT NOT NULL"),
    ("pid", "INTEGER"),
    ("created_at", "INTEGER"),
    ("started_at", "INTEGER"),
    ("stopped_at", "INTEGER"),
];

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS workers (id TEXT PRIMARY KEY NOT NULL);
         CREATE TABLE IF NOT EXISTS towns (name TEXT PRIMARY KEY NOT NULL);",
    )?;

    migrate_table(conn, "workers", WORKER_COLUMNS)?;
    migrate_table(conn, "towns", TOWN_COLUMNS)?;

    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_towns_port ON towns(port);
         CREATE UNIQUE INDEX IF NOT EXISTS idx_towns_project_path ON towns(project_path)
             WHERE project_path IS NOT NULL;
         CREATE INDEX IF NOT EXISTS idx_workers_project_role ON workers(project_path, role);
         CREATE INDEX IF NOT EXISTS idx_workers_status ON workers(status);",
    )?;

    Ok(())
}

fn migrate_table(conn: &Connection, table: &str, columns: &[(&str, &str)]) -> Result<()> {
    let existing = existing_columns(conn, table)?;
    for (name, decl) in columns {
        if existing.iter().any(|c| c == name) {
            continue;
        }
        // SQLite can't ADD COLUMN with a PRIMARY KEY clause; the bootstrap
        // CREATE TABLE above already handles the primary key column.
        if decl.contains("PRIMARY KEY") {
            continue;
        }
        let sql = format!("ALTER TABLE {table} ADD COLUMN {name} {decl}");
        conn.execute(&sql, [])?;
    }
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({table})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
