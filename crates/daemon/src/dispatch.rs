//! The dispatch loop: periodically checks the external work queue for each
//! configured role and spawns a single-task worker when work is found and no
//! worker is already live for that `(project, role)` pair.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use oj_core::Role;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::bd;
use crate::manager::{SpawnParams, WorkerManager};
use crate::spawner::Spawner;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub project_path: PathBuf,
    pub roles: Vec<Role>,
    pub interval: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatus {
    pub enabled: bool,
    pub project_path: Option<PathBuf>,
    pub roles: Vec<Role>,
    pub interval_seconds: u64,
    pub task_running: bool,
}

pub struct Dispatcher<S: Spawner> {
    manager: Arc<WorkerManager<S>>,
    bd_timeout: Duration,
    config: Mutex<Option<DispatchConfig>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<S: Spawner + 'static> Dispatcher<S> {
    pub fn new(manager: Arc<WorkerManager<S>>, bd_timeout: Duration) -> Arc<Self> {
        Arc::new(Self { manager, bd_timeout, config: Mutex::new(None), task: Mutex::new(None) })
    }

    /// Enable the loop with a new configuration, replacing any existing one.
    pub fn start(self: &Arc<Self>, config: DispatchConfig) {
        self.stop();
        *self.config.lock() = Some(config);
        let dispatcher = Arc::clone(self);
        let task = tokio::spawn(async move { dispatcher.run().await });
        *self.task.lock() = Some(task);
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        *self.config.lock() = None;
    }

    pub fn status(&self) -> DispatchStatus {
        let config = self.config.lock().clone();
        let task_running = self.task.lock().as_ref().map(|t| !t.is_finished()).unwrap_or(false);
        match config {
            Some(c) => DispatchStatus {
                enabled: true,
                project_path: Some(c.project_path),
                roles: c.roles,
                interval_seconds: c.interval.as_secs(),
                task_running,
            },
            None => DispatchStatus { enabled: false, project_path: None, roles: Vec::new(), interval_seconds: 0, task_running: false },
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            let config = self.config.lock().clone();
            let Some(config) = config else { return };

            for role in &config.roles {
                if let Err(e) = self.dispatch_one_role(&config.project_path, *role).await {
                    warn!(role = %role, error = %e, "dispatch iteration failed for role");
                }
            }

            tokio::time::sleep(config.interval).await;
            if self.config.lock().is_none() {
                return;
            }
        }
    }

    async fn dispatch_one_role(&self, project_path: &PathBuf, role: Role) -> Result<(), crate::error::ManagerError> {
        let live = self.manager.live_ids_for(project_path, role)?;
        if !live.is_empty() {
            return Ok(());
        }

        let Some(bead_id) = bd::first_ready_bead(project_path, role.label_filter(), self.bd_timeout).await else {
            return Ok(());
        };

        let worker = self
            .manager
            .spawn(SpawnParams {
                role,
                project_path: project_path.clone(),
                town: "default".to_string(),
                auto_restart: false,
                bead_id: Some(bead_id.clone()),
                env: std::collections::HashMap::new(),
            })
            .await?;

        info!(worker_id = %worker.id, role = %role, bead_id = %bead_id, "dispatched single-task worker");
        Ok(())
    }
}
