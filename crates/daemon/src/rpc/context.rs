//! Shared state handed to every RPC handler: the Worker Manager, the
//! Dispatcher, and the daemon's own shutdown signaling.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use oj_core::HealthConfig;

use crate::dispatch::Dispatcher;
use crate::manager::WorkerManager;
use crate::spawner::Spawner;

pub struct RpcContext<S: Spawner> {
    pub manager: Arc<WorkerManager<S>>,
    pub dispatcher: Arc<Dispatcher<S>>,
    pub started_at: i64,
    pub shutdown: Arc<AtomicBool>,
    pub shutdown_notify: Arc<tokio::sync::Notify>,
    pub health_config: HealthConfig,
    pub worker_stop_grace: Duration,
    pub default_dispatch_interval: Duration,
}
