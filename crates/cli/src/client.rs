//! Thin wrapper over `oj_daemon::rpc::RpcClient` giving each registered
//! method (§4.D) its own typed call instead of making every command build
//! its own `serde_json::json!` params by hand.

use std::path::PathBuf;
use std::time::Duration;

use oj_daemon::rpc::RpcClient;
use oj_wire::RpcError;
use serde_json::{json, Value};

pub struct Client {
    inner: RpcClient,
}

impl Client {
    pub fn connect(socket_path: PathBuf) -> Self {
        Self { inner: RpcClient::new(socket_path, 3, Duration::from_secs(30)) }
    }

    pub async fn daemon_status(&self) -> Result<Value, RpcError> {
        self.inner.call("daemon.status", Value::Null).await
    }

    pub async fn daemon_shutdown(&self, graceful: bool) -> Result<Value, RpcError> {
        self.inner.call("daemon.shutdown", json!({"graceful": graceful})).await
    }

    pub async fn worker_list(&self, status: Option<&str>, project_path: Option<&PathBuf>, role: Option<&str>) -> Result<Value, RpcError> {
        self.inner
            .call("worker.list", json!({"status": status, "project_path": project_path, "role": role}))
            .await
    }

    pub async fn worker_get(&self, worker_id: &str) -> Result<Value, RpcError> {
        self.inner.call("worker.get", json!({"worker_id": worker_id})).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn worker_spawn(
        &self,
        role: &str,
        project_path: &PathBuf,
        town: Option<&str>,
        auto_restart: bool,
        bead_id: Option<&str>,
    ) -> Result<Value, RpcError> {
        self.inner
            .call(
                "worker.spawn",
                json!({
                    "role": role,
                    "project_path": project_path,
                    "town": town,
                    "auto_restart": auto_restart,
                    "bead_id": bead_id,
                }),
            )
            .await
    }

    pub async fn worker_stop(&self, worker_id: &str, graceful: bool, timeout_seconds: Option<u64>) -> Result<Value, RpcError> {
        self.inner
            .call("worker.stop", json!({"worker_id": worker_id, "graceful": graceful, "timeout": timeout_seconds}))
            .await
    }

    pub async fn health_status(&self) -> Result<Value, RpcError> {
        self.inner.call("health.status", Value::Null).await
    }

    pub async fn dispatch_start(&self, project_path: &PathBuf, roles: Option<&[String]>, interval_seconds: Option<u64>) -> Result<Value, RpcError> {
        self.inner
            .call("dispatch.start", json!({"project_path": project_path, "roles": roles, "interval_seconds": interval_seconds}))
            .await
    }

    pub async fn dispatch_stop(&self) -> Result<Value, RpcError> {
        self.inner.call("dispatch.stop", Value::Null).await
    }

    pub async fn dispatch_status(&self) -> Result<Value, RpcError> {
        self.inner.call("dispatch.status", Value::Null).await
    }
}
