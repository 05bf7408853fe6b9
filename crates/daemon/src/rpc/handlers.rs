//! Method dispatch table: one function per registered RPC method, reading
//! and writing through `RpcContext`. Kept free of framing/transport concerns
//! so it can be unit-tested by constructing a `Request` directly.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use oj_core::{Role, WorkerId, WorkerStatus};
use oj_storage::WorkerFilter;
use oj_wire::{Request, Response, RpcError};
use serde::Deserialize;
use serde_json::json;

use crate::dispatch::DispatchConfig;
use crate::heartbeat;
use crate::spawner::Spawner;

use super::context::RpcContext;

pub async fn dispatch<S: Spawner + 'static>(ctx: &RpcContext<S>, req: Request) -> Response {
    let id = req.id.clone();
    let result = match req.method.as_str() {
        "daemon.status" => daemon_status(ctx).await,
        "daemon.shutdown" => daemon_shutdown(ctx, &req).await,
        "worker.list" => worker_list(ctx, &req).await,
        "worker.get" => worker_get(ctx, &req).await,
        "worker.spawn" => worker_spawn(ctx, &req).await,
        "worker.stop" => worker_stop(ctx, &req).await,
        "health.status" => health_status(ctx).await,
        "dispatch.start" => dispatch_start(ctx, &req).await,
        "dispatch.stop" => dispatch_stop(ctx).await,
        "dispatch.status" => dispatch_status(ctx).await,
        other => Err(RpcError::method_not_found(other)),
    };
    match result {
        Ok(value) => Response::ok(id, value),
        Err(e) => Response::err(id, e),
    }
}

async fn daemon_status<S: Spawner + 'static>(ctx: &RpcContext<S>) -> Result<serde_json::Value, RpcError> {
    let now = heartbeat::now_epoch_secs();
    let workers_count = ctx.manager.list(&WorkerFilter::new()).map_err(|e| RpcError::internal_error(e.to_string()))?.len();
    Ok(json!({
        "state": if ctx.shutdown.load(Ordering::SeqCst) { "shutting_down" } else { "running" },
        "pid": std::process::id(),
        "started_at": ctx.started_at,
        "uptime_seconds": (now - ctx.started_at).max(0),
        "workers_count": workers_count,
    }))
}

#[derive(Deserialize, Default)]
struct ShutdownParams {
    #[serde(default)]
    graceful: Option<bool>,
}

async fn daemon_shutdown<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let _params: ShutdownParams = if req.params.is_null() { ShutdownParams::default() } else { req.params_as()? };
    ctx.shutdown.store(true, Ordering::SeqCst);
    ctx.shutdown_notify.notify_waiters();
    Ok(json!({"scheduled": true}))
}

#[derive(Deserialize, Default)]
struct WorkerListParams {
    status: Option<String>,
    project_path: Option<PathBuf>,
    role: Option<String>,
}

async fn worker_list<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let params: WorkerListParams = if req.params.is_null() { WorkerListParams::default() } else { req.params_as()? };
    let mut filter = WorkerFilter::new();
    if let Some(status) = params.status {
        filter = filter.with_status(parse_status(&status)?);
    }
    if let Some(role) = params.role {
        filter = filter.with_role(parse_role(&role)?);
    }
    if let Some(path) = params.project_path {
        filter = filter.with_project_path(path);
    }
    let workers = ctx.manager.list(&filter).map_err(|e| RpcError::internal_error(e.to_string()))?;
    serde_json::to_value(workers).map_err(|e| RpcError::internal_error(e.to_string()))
}

#[derive(Deserialize)]
struct WorkerGetParams {
    worker_id: String,
}

async fn worker_get<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let params: WorkerGetParams = req.params_as()?;
    let worker = ctx
        .manager
        .get(&WorkerId::new(params.worker_id.clone()))
        .map_err(|e| RpcError::internal_error(e.to_string()))?
        .ok_or_else(|| RpcError::invalid_params(format!("no such worker: {}", params.worker_id)))?;
    serde_json::to_value(worker).map_err(|e| RpcError::internal_error(e.to_string()))
}

#[derive(Deserialize)]
struct WorkerSpawnParams {
    role: String,
    project_path: PathBuf,
    #[serde(default)]
    town: Option<String>,
    #[serde(default = "default_true")]
    auto_restart: bool,
    #[serde(default)]
    bead_id: Option<String>,
}

fn default_true() -> bool {
    true
}

async fn worker_spawn<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let params: WorkerSpawnParams = req.params_as()?;
    let role = parse_role(&params.role)?;
    let worker = ctx
        .manager
        .spawn(crate::manager::SpawnParams {
            role,
            project_path: params.project_path,
            town: params.town.unwrap_or_else(|| "default".to_string()),
            auto_restart: params.auto_restart,
            bead_id: params.bead_id,
            env: std::collections::HashMap::new(),
        })
        .await?;
    serde_json::to_value(worker).map_err(|e| RpcError::internal_error(e.to_string()))
}

#[derive(Deserialize)]
struct WorkerStopParams {
    worker_id: String,
    #[serde(default = "default_true")]
    graceful: bool,
    #[serde(default)]
    timeout: Option<u64>,
}

async fn worker_stop<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let params: WorkerStopParams = req.params_as()?;
    let timeout = Duration::from_secs(params.timeout.unwrap_or(ctx.worker_stop_grace.as_secs()));
    let worker = ctx.manager.stop(&WorkerId::new(params.worker_id), params.graceful, timeout).await?;
    serde_json::to_value(worker).map_err(|e| RpcError::internal_error(e.to_string()))
}

async fn health_status<S: Spawner + 'static>(ctx: &RpcContext<S>) -> Result<serde_json::Value, RpcError> {
    let summary = ctx.manager.health_summary().await.map_err(|e| RpcError::internal_error(e.to_string()))?;
    Ok(json!({"summary": summary, "config": ctx.health_config}))
}

#[derive(Deserialize)]
struct DispatchStartParams {
    project_path: PathBuf,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    interval_seconds: Option<u64>,
}

async fn dispatch_start<S: Spawner + 'static>(ctx: &RpcContext<S>, req: &Request) -> Result<serde_json::Value, RpcError> {
    let params: DispatchStartParams = req.params_as()?;
    let roles = match params.roles {
        Some(names) => names.iter().map(|n| parse_role(n)).collect::<Result<Vec<_>, _>>()?,
        None => Role::ALL.to_vec(),
    };
    ctx.dispatcher.start(DispatchConfig {
        project_path: params.project_path,
        roles,
        interval: Duration::from_secs(params.interval_seconds.unwrap_or(ctx.default_dispatch_interval.as_secs())),
    });
    Ok(json!({"enabled": true}))
}

async fn dispatch_stop<S: Spawner + 'static>(ctx: &RpcContext<S>) -> Result<serde_json::Value, RpcError> {
    ctx.dispatcher.stop();
    Ok(json!({"enabled": false}))
}

async fn dispatch_status<S: Spawner + 'static>(ctx: &RpcContext<S>) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(ctx.dispatcher.status()).map_err(|e| RpcError::internal_error(e.to_string()))
}

fn parse_role(s: &str) -> Result<Role, RpcError> {
    s.parse().map_err(|_| RpcError::invalid_params(format!("unknown role: {s}")))
}

fn parse_status(s: &str) -> Result<WorkerStatus, RpcError> {
    match s {
        "pending" => Ok(WorkerStatus::Pending),
        "starting" => Ok(WorkerStatus::Starting),
        "running" => Ok(WorkerStatus::Running),
        "stopping" => Ok(WorkerStatus::Stopping),
        "stopped" => Ok(WorkerStatus::Stopped),
        "crashed" => Ok(WorkerStatus::Crashed),
        "failed" => Ok(WorkerStatus::Failed),
        other => Err(RpcError::invalid_params(format!("unknown worker status: {other}"))),
    }
}
