//! Worker Manager: owns worker state and the health/restart loop. Spawn,
//! stop, and crash-recovery logic all funnel through here so there is one
//! place that reconciles the in-memory process handle, the heartbeat file,
//! and the persisted [`Worker`] record.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oj_core::{HealthSummary, Role, Worker, WorkerId, WorkerStatus};
use oj_storage::{WorkerFilter, WorkerStore};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::error::ManagerError;
use crate::heartbeat;
use crate::lifecycle::process_exists;
use crate::spawner::{ProcessHandle, SpawnRequest, Spawner};

/// A spawn request's caller-supplied parameters, grouped to keep `spawn`'s
/// signature from growing every time the RPC layer needs one more field.
pub struct SpawnParams {
    pub role: Role,
    pub project_path: PathBuf,
    pub town: String,
    pub auto_restart: bool,
    pub bead_id: Option<String>,
    pub env: HashMap<String, String>,
}

pub struct WorkerManager<S: Spawner> {
    store: Arc<WorkerStore>,
    spawner: Arc<S>,
    config: DaemonConfig,
    handles: Mutex<HashMap<String, Box<dyn ProcessHandle>>>,
    pending_restarts: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl<S: Spawner + 'static> WorkerManager<S> {
    pub fn new(store: Arc<WorkerStore>, spawner: Arc<S>, config: DaemonConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            spawner,
            config,
            handles: Mutex::new(HashMap::new()),
            pending_restarts: Mutex::new(HashMap::new()),
        })
    }

    /// Create a worker record in `pending`, call the Spawner, and move it to
    /// `running` on success or `failed` on error. Either outcome is
    /// persisted before this returns.
    pub async fn spawn(self: &Arc<Self>, params: SpawnParams) -> Result<Worker, ManagerError> {
        let id = WorkerId::new(oj_core::new_worker_id(params.role));
        let created_at = heartbeat::now_epoch_secs();
        let mut worker = Worker::new(
            id.clone(),
            params.role,
            params.project_path.clone(),
            params.town,
            created_at,
            params.auto_restart,
            params.bead_id.clone(),
        );
        worker.status = WorkerStatus::Starting;
        self.store.insert_worker(&worker)?;

        let mut env = params.env;
        self.insert_base_env(&mut env, &id, params.role, &params.project_path, &worker.town);

        let req = SpawnRequest {
            role: params.role,
            project_path: &params.project_path,
            worker_id: id.as_str(),
            env,
            bead_id: worker.bead_id.as_deref(),
            worktree_enabled: true,
            logs_dir: &self.config.logs_dir(),
        };

        match self.spawner.spawn(req).await {
            Ok((info, handle)) => {
                worker.status = WorkerStatus::Running;
                worker.pid = Some(info.pid);
                worker.started_at = Some(info.started_at);
                worker.worktree_path = info.worktree.as_ref().map(|w| w.path.clone());
                worker.worktree_branch = info.worktree.map(|w| w.branch);
                self.store.update_worker(&worker)?;

                heartbeat::write_heartbeat(&self.config.heartbeat_file(id.as_str()), info.started_at)?;
                worker.last_heartbeat_at = Some(info.started_at);

                self.handles.lock().insert(id.as_str().to_string(), handle);
                info!(worker_id = %id, role = %params.role, "worker spawned");
                Ok(worker)
            }
            Err(e) => {
                worker.status = WorkerStatus::Failed;
                worker.error_message = Some(e.to_string());
                worker.stopped_at = Some(heartbeat::now_epoch_secs());
                self.store.update_worker(&worker)?;
                Err(ManagerError::Spawn(e))
            }
        }
    }

    /// Stop one worker. A no-op returning the current record if it is
    /// already terminal.
    pub async fn stop(self: &Arc<Self>, id: &WorkerId, graceful: bool, timeout: Duration) -> Result<Worker, ManagerError> {
        let mut worker = self.store.get_worker(id)?.ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        if worker.status.is_terminal() {
            return Ok(worker);
        }
        worker.status = WorkerStatus::Stopping;
        self.store.update_worker(&worker)?;

        let handle = self.handles.lock().remove(id.as_str());
        let exit_code = match handle {
            Some(handle) => self.spawner.terminate(handle, graceful, timeout).await,
            None => None,
        };

        worker.status = WorkerStatus::Stopped;
        worker.exit_code = exit_code;
        worker.stopped_at = Some(heartbeat::now_epoch_secs());
        self.store.update_worker(&worker)?;
        heartbeat::remove_heartbeat(&self.config.heartbeat_file(id.as_str()));
        self.cancel_pending_restart(id.as_str());
        Ok(worker)
    }

    /// Stop every non-terminal worker. Individual failures are logged and
    /// do not abort the sweep.
    pub async fn stop_all(self: &Arc<Self>, graceful: bool, timeout: Duration) {
        let running = match self.store.list_workers(&WorkerFilter::new().with_status(WorkerStatus::Running)) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "failed to list running workers during shutdown");
                return;
            }
        };
        for worker in running {
            if let Err(e) = self.stop(&worker.id, graceful, timeout).await {
                error!(worker_id = %worker.id, error = %e, "failed to stop worker during shutdown sweep");
            }
        }
    }

    /// Crash detection followed by restart scheduling, run once per
    /// health-check tick.
    pub async fn health_check_and_restart(self: &Arc<Self>) -> Result<(), ManagerError> {
        let now = heartbeat::now_epoch_secs();
        let running = self.store.list_workers(&WorkerFilter::new().with_status(WorkerStatus::Running))?;
        for mut worker in running {
            let pid_alive = worker.pid.map(process_exists).unwrap_or(false);
            let heartbeat_path = self.config.heartbeat_file(worker.id.as_str());
            let stale = heartbeat::heartbeat_age_secs(&heartbeat_path, now)
                .map(|age| age > self.config.health.heartbeat_timeout_secs as i64)
                .unwrap_or(false);

            if pid_alive && !stale {
                continue;
            }

            worker.status = WorkerStatus::Crashed;
            worker.crash_count += 1;
            worker.stopped_at = Some(now);
            self.store.update_worker(&worker)?;
            self.handles.lock().remove(worker.id.as_str());
            heartbeat::remove_heartbeat(&heartbeat_path);
            warn!(worker_id = %worker.id, crash_count = worker.crash_count, "worker classified as crashed");

            self.maybe_schedule_restart(&worker);
        }
        Ok(())
    }

    fn maybe_schedule_restart(self: &Arc<Self>, worker: &Worker) {
        if !self.config.health.auto_restart_enabled || !worker.auto_restart_enabled {
            return;
        }
        if worker.crash_count >= self.config.health.max_restart_count {
            let mut disabled = worker.clone();
            disabled.auto_restart_enabled = false;
            disabled.error_message = Some(format!("restart ceiling ({}) reached", self.config.health.max_restart_count));
            if let Err(e) = self.store.update_worker(&disabled) {
                error!(worker_id = %worker.id, error = %e, "failed to persist restart-ceiling disable");
            }
            return;
        }
        if self.pending_restarts.lock().contains_key(worker.id.as_str()) {
            return;
        }
        let delay = Duration::from_secs(self.config.health.backoff_for(worker.crash_count));
        self.schedule_restart(worker.id.clone(), delay);
    }

    fn schedule_restart(self: &Arc<Self>, id: WorkerId, delay: Duration) {
        let manager = Arc::clone(self);
        let id_key = id.as_str().to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.pending_restarts.lock().remove(id.as_str());
            if let Err(e) = manager.fire_restart(&id).await {
                error!(worker_id = %id, error = %e, "scheduled restart failed");
            }
        });
        self.pending_restarts.lock().insert(id_key, task);
    }

    async fn fire_restart(self: &Arc<Self>, id: &WorkerId) -> Result<(), ManagerError> {
        let mut worker = match self.store.get_worker(id)? {
            Some(w) => w,
            None => return Ok(()),
        };
        if !matches!(worker.status, WorkerStatus::Crashed | WorkerStatus::Failed) || !worker.auto_restart_enabled {
            return Ok(());
        }

        let mut env = HashMap::new();
        self.insert_base_env(&mut env, id, worker.role, &worker.project_path, &worker.town);
        let req = SpawnRequest {
            role: worker.role,
            project_path: &worker.project_path,
            worker_id: id.as_str(),
            env,
            bead_id: worker.bead_id.as_deref(),
            worktree_enabled: true,
            logs_dir: &self.config.logs_dir(),
        };

        match self.spawner.spawn(req).await {
            Ok((info, handle)) => {
                worker.status = WorkerStatus::Running;
                worker.pid = Some(info.pid);
                worker.started_at = Some(info.started_at);
                worker.last_restart_at = Some(info.started_at);
                worker.exit_code = None;
                worker.error_message = None;
                worker.worktree_path = info.worktree.as_ref().map(|w| w.path.clone());
                worker.worktree_branch = info.worktree.map(|w| w.branch);
                self.store.update_worker(&worker)?;
                heartbeat::write_heartbeat(&self.config.heartbeat_file(id.as_str()), info.started_at)?;
                self.handles.lock().insert(id.as_str().to_string(), handle);
                info!(worker_id = %id, "worker restarted");
            }
            Err(e) => {
                worker.status = WorkerStatus::Failed;
                worker.error_message = Some(format!("restart failed: {e}"));
                self.store.update_worker(&worker)?;
            }
        }
        Ok(())
    }

    /// The fixed part of the environment every spawn (initial or restart)
    /// propagates to the child. `WORKER_WORKING_DIR`, `WORKER_WORKTREE`, and
    /// `WORKER_BRANCH` aren't set here — the worktree path isn't known
    /// until the Spawner creates one, so those are filled in there.
    fn insert_base_env(&self, env: &mut HashMap<String, String>, id: &WorkerId, role: Role, project_path: &std::path::Path, town: &str) {
        env.insert("WORKER_ID".to_string(), id.as_str().to_string());
        env.insert("WORKER_ROLE".to_string(), role.as_str().to_string());
        env.insert("WORKER_PROJECT".to_string(), project_path.display().to_string());
        env.insert("WORKER_TOWN".to_string(), town.to_string());
        env.insert("WORKER_LOG_FILE".to_string(), project_path.join("claude.log").display().to_string());
        env.insert("WORKER_HEARTBEAT_FILE".to_string(), self.config.heartbeat_file(id.as_str()).display().to_string());
        env.insert("TERM".to_string(), "xterm-256color".to_string());
    }

    fn cancel_pending_restart(&self, id: &str) {
        if let Some(task) = self.pending_restarts.lock().remove(id) {
            task.abort();
        }
    }

    /// Cancel every pending restart task. Called as the first step of
    /// shutdown.
    pub fn cancel_all_pending_restarts(&self) {
        for (_, task) in self.pending_restarts.lock().drain() {
            task.abort();
        }
    }

    pub async fn health_summary(&self) -> Result<HealthSummary, ManagerError> {
        let all = self.store.list_workers(&WorkerFilter::new())?;
        let now = heartbeat::now_epoch_secs();
        let mut summary = HealthSummary::default();
        for worker in &all {
            match worker.status {
                WorkerStatus::Running => {
                    let heartbeat_path = self.config.heartbeat_file(worker.id.as_str());
                    let pid_alive = worker.pid.map(process_exists).unwrap_or(false);
                    let fresh = heartbeat::heartbeat_age_secs(&heartbeat_path, now)
                        .map(|age| age <= self.config.health.heartbeat_timeout_secs as i64)
                        .unwrap_or(false);
                    if pid_alive && fresh {
                        summary.healthy_running += 1;
                    } else {
                        summary.unhealthy_running += 1;
                    }
                }
                WorkerStatus::Crashed => summary.crashed += 1,
                _ => {}
            }
            summary.total_restarts += worker.crash_count as u64;
            if worker.crash_count >= self.config.health.max_restart_count {
                summary.at_restart_ceiling += 1;
            }
        }
        Ok(summary)
    }

    pub fn get(&self, id: &WorkerId) -> Result<Option<Worker>, ManagerError> {
        Ok(self.store.get_worker(id)?)
    }

    pub fn list(&self, filter: &WorkerFilter) -> Result<Vec<Worker>, ManagerError> {
        Ok(self.store.list_workers(filter)?)
    }

    /// Remove worktree directories that don't belong to any non-terminal
    /// worker, grouped by project so a sweep of one project's `.worktrees/`
    /// never touches another's.
    pub async fn sweep_worktrees(&self) {
        let all = match self.store.list_workers(&WorkerFilter::new()) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "failed to list workers for worktree sweep");
                return;
            }
        };
        let mut live_by_project: HashMap<PathBuf, Vec<String>> = HashMap::new();
        for worker in all {
            if !worker.status.is_terminal() {
                live_by_project.entry(worker.project_path.clone()).or_default().push(worker.id.as_str().to_string());
            }
        }
        for (project_path, live_ids) in live_by_project {
            if let Err(e) = crate::spawner::worktree::sweep_orphans(&project_path, &live_ids).await {
                warn!(project_path = %project_path.display(), error = %e, "worktree sweep failed");
            }
        }
    }

    /// Worker ids currently tracked as running for a given `(project, role)`,
    /// pruning any whose OS process has disappeared. Used by the dispatch
    /// loop to enforce at most one live worker per project/role.
    pub fn live_ids_for(&self, project_path: &std::path::Path, role: Role) -> Result<HashSet<String>, ManagerError> {
        let filter = WorkerFilter::new().with_status(WorkerStatus::Running).with_role(role).with_project_path(project_path);
        let workers = self.store.list_workers(&filter)?;
        Ok(workers
            .into_iter()
            .filter(|w| w.pid.map(process_exists).unwrap_or(false))
            .map(|w| w.id.as_str().to_string())
            .collect())
    }
}
