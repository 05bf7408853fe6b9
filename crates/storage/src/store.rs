//! `WorkerStore`: the single-writer, file-backed relational store.
//!
//! Backed by `rusqlite` opened in WAL mode against one file, with the
//! connection guarded by a `parking_lot::Mutex`. SQLite serializes writers
//! itself; the mutex exists to avoid busy-retry loops under the cooperative
//! scheduler, matching the single-writer model the rest of the daemon
//! assumes.

use std::path::{Path, PathBuf};

use oj_core::{Role, Town, TownStatus, TownTemplate, Worker, WorkerId, WorkerStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::filters::WorkerFilter;
use crate::schema;

pub struct WorkerStore {
    conn: Mutex<Connection>,
}

impl WorkerStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // ---- workers -------------------------------------------------------

    pub fn insert_worker(&self, w: &Worker) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO workers (
                id, role, project_path, town, status, pid,
                created_at, started_at, stopped_at, last_heartbeat_at, last_restart_at,
                crash_count, auto_restart_enabled, exit_code, error_message,
                worktree_path, worktree_branch, bead_id
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            params![
                w.id.as_str(),
                w.role.as_str(),
                path_to_str(&w.project_path),
                w.town,
                w.status.as_str(),
                w.pid,
                w.created_at,
                w.started_at,
                w.stopped_at,
                w.last_heartbeat_at,
                w.last_restart_at,
                w.crash_count,
                w.auto_restart_enabled as i64,
                w.exit_code,
                w.error_message,
                w.worktree_path.as_ref().map(|p| path_to_str(p)),
                w.worktree_branch,
                w.bead_id,
            ],
        )
        .map_err(|e| conflict_or(e, &w.id.0))?;
        Ok(())
    }

    pub fn update_worker(&self, w: &Worker) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE workers SET
                role=?2, project_path=?3, town=?4, status=?5, pid=?6,
                created_at=?7, started_at=?8, stopped_at=?9, last_heartbeat_at=?10, last_restart_at=?11,
                crash_count=?12, auto_restart_enabled=?13, exit_code=?14, error_message=?15,
                worktree_path=?16, worktree_branch=?17, bead_id=?18
             WHERE id=?1",
            params![
                w.id.as_str(),
                w.role.as_str(),
                path_to_str(&w.project_path),
                w.town,
                w.status.as_str(),
                w.pid,
                w.created_at,
                w.started_at,
                w.stopped_at,
                w.last_heartbeat_at,
                w.last_restart_at,
                w.crash_count,
                w.auto_restart_enabled as i64,
                w.exit_code,
                w.error_message,
                w.worktree_path.as_ref().map(|p| path_to_str(p)),
                w.worktree_branch,
                w.bead_id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::Conflict(format!("no worker with id {}", w.id)));
        }
        Ok(())
    }

    pub fn get_worker(&self, id: &WorkerId) -> Result<Option<Worker>> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM workers WHERE id = ?1", params![id.as_str()], row_to_worker)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_workers(&self, filter: &WorkerFilter) -> Result<Vec<Worker>> {
        let conn = self.conn.lock();
        let (clause, args) = worker_where_clause(filter);
        let sql = format!("SELECT * FROM workers{clause} ORDER BY created_at ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_worker)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_workers(&self, filter: &WorkerFilter) -> Result<u64> {
        let conn = self.conn.lock();
        let (clause, args) = worker_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM workers{clause}");
        conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), |row| row.get(0))
            .map_err(Into::into)
    }

    // ---- towns ----------------------------------------------------------

    pub fn insert_town(&self, t: &Town) -> Result<()> {
        let conn = self.conn.lock();
        let workflow = serde_json::to_string(&t.workflow).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO towns (name, port, project_path, template, workflow, status, pid, created_at, started_at, stopped_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                t.name,
                t.port,
                t.project_path.as_ref().map(|p| path_to_str(p)),
                template_str(t.template),
                workflow,
                town_status_str(t.status),
                t.pid,
                t.created_at,
                t.started_at,
                t.stopped_at,
            ],
        )
        .map_err(|e| conflict_or(e, &t.name))?;
        Ok(())
    }

    pub fn update_town(&self, t: &Town) -> Result<()> {
        let conn = self.conn.lock();
        let workflow = serde_json::to_string(&t.workflow).unwrap_or_else(|_| "[]".to_string());
        let updated = conn.execute(
            "UPDATE towns SET port=?2, project_path=?3, template=?4, workflow=?5, status=?6, pid=?7,
                created_at=?8, started_at=?9, stopped_at=?10 WHERE name=?1",
            params![
                t.name,
                t.port,
                t.project_path.as_ref().map(|p| path_to_str(p)),
                template_str(t.template),
                workflow,
                town_status_str(t.status),
                t.pid,
                t.created_at,
                t.started_at,
                t.stopped_at,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::Conflict(format!("no town named {}", t.name)));
        }
        Ok(())
    }

    pub fn get_town(&self, name: &str) -> Result<Option<Town>> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM towns WHERE name = ?1", params![name], row_to_town)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_towns(&self) -> Result<Vec<Town>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM towns ORDER BY name ASC")?;
        let rows = stmt.query_map([], row_to_town)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn delete_town(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM towns WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    /// Smallest unused port in `[start, end]` across all towns, or `None` if
    /// the range is exhausted.
    pub fn allocate_port(&self, start: u16, end: u16) -> Result<Option<u16>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT port FROM towns WHERE port BETWEEN ?1 AND ?2")?;
        let used: std::collections::HashSet<u16> = stmt
            .query_map(params![start, end], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        Ok((start..=end).find(|p| !used.contains(p)))
    }
}

fn worker_where_clause(filter: &WorkerFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    if let Some(status) = filter.status {
        clauses.push(format!("status = ?{}", clauses.len() + 1));
        args.push(status.as_str().to_string());
    }
    if let Some(role) = filter.role {
        clauses.push(format!("role = ?{}", clauses.len() + 1));
        args.push(role.as_str().to_string());
    }
    if let Some(path) = &filter.project_path {
        clauses.push(format!("project_path = ?{}", clauses.len() + 1));
        args.push(path_to_str(path));
    }
    if let Some(town) = &filter.town {
        clauses.push(format!("town = ?{}", clauses.len() + 1));
        args.push(town.clone());
    }
    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

fn path_to_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn template_str(t: TownTemplate) -> &'static str {
    match t {
        TownTemplate::Solo => "solo",
        TownTemplate::Pair => "pair",
        TownTemplate::Full => "full",
    }
}

fn parse_template(s: &str) -> Result<TownTemplate> {
    match s {
        "solo" => Ok(TownTemplate::Solo),
        "pair" => Ok(TownTemplate::Pair),
        "full" => Ok(TownTemplate::Full),
        other => Err(StoreError::Decode { column: "template", detail: other.to_string() }),
    }
}

fn town_status_str(s: TownStatus) -> &'static str {
    match s {
        TownStatus::Stopped => "stopped",
        TownStatus::Starting => "starting",
        TownStatus::Running => "running",
        TownStatus::Stopping => "stopping",
    }
}

fn parse_town_status(s: &str) -> Result<TownStatus> {
    match s {
        "stopped" => Ok(TownStatus::Stopped),
        "starting" => Ok(TownStatus::Starting),
        "running" => Ok(TownStatus::Running),
        "stopping" => Ok(TownStatus::Stopping),
        other => Err(StoreError::Decode { column: "status", detail: other.to_string() }),
    }
}

fn parse_role(s: &str) -> Result<Role> {
    s.parse().map_err(|_| StoreError::Decode { column: "role", detail: s.to_string() })
}

fn parse_worker_status(s: &str) -> Result<WorkerStatus> {
    match s {
        "pending" => Ok(WorkerStatus::Pending),
        "starting" => Ok(WorkerStatus::Starting),
        "running" => Ok(WorkerStatus::Running),
        "stopping" => Ok(WorkerStatus::Stopping),
        "stopped" => Ok(WorkerStatus::Stopped),
        "crashed" => Ok(WorkerStatus::Crashed),
        "failed" => Ok(WorkerStatus::Failed),
        other => Err(StoreError::Decode { column: "status", detail: other.to_string() }),
    }
}

fn row_to_worker(row: &Row) -> rusqlite::Result<Worker> {
    let role_str: String = row.get("role")?;
    let status_str: String = row.get("status")?;
    let project_path: String = row.get("project_path")?;
    let worktree_path: Option<String> = row.get("worktree_path")?;
    let auto_restart_enabled: i64 = row.get("auto_restart_enabled")?;

    Ok(Worker {
        id: WorkerId::new(row.get::<_, String>("id")?),
        role: parse_role(&role_str).map_err(decode_err)?,
        project_path: PathBuf::from(project_path),
        town: row.get("town")?,
        status: parse_worker_status(&status_str).map_err(decode_err)?,
        pid: row.get::<_, Option<i64>>("pid")?.map(|v| v as u32),
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        stopped_at: row.get("stopped_at")?,
        last_heartbeat_at: row.get("last_heartbeat_at")?,
        last_restart_at: row.get("last_restart_at")?,
        crash_count: row.get::<_, i64>("crash_count")? as u32,
        auto_restart_enabled: auto_restart_enabled != 0,
        exit_code: row.get::<_, Option<i64>>("exit_code")?.map(|v| v as i32),
        error_message: row.get("error_message")?,
        worktree_path: worktree_path.map(PathBuf::from),
        worktree_branch: row.get("worktree_branch")?,
        bead_id: row.get("bead_id")?,
    })
}

fn row_to_town(row: &Row) -> rusqlite::Result<Town> {
    let template_str: String = row.get("template")?;
    let status_str: String = row.get("status")?;
    let workflow_str: String = row.get("workflow")?;
    let project_path: Option<String> = row.get("project_path")?;

    Ok(Town {
        name: row.get("name")?,
        port: row.get::<_, i64>("port")? as u16,
        project_path: project_path.map(PathBuf::from),
        template: parse_template(&template_str).map_err(decode_err)?,
        workflow: serde_json::from_str(&workflow_str).unwrap_or_default(),
        status: parse_town_status(&status_str).map_err(decode_err)?,
        pid: row.get::<_, Option<i64>>("pid")?.map(|v| v as u32),
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        stopped_at: row.get("stopped_at")?,
    })
}

fn decode_err(e: StoreError) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, format!("{e}"), rusqlite::types::Type::Text)
}

fn conflict_or(e: rusqlite::Error, key: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref sf, _) = e {
        if sf.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::Conflict(key.to_string());
        }
    }
    StoreError::Sqlite(e)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
