//! Subcommand definitions and their handlers. Each handler makes exactly one
//! RPC call and prints the response as pretty JSON — `oj` is a thin probe
//! into the daemon, not a second place to format worker state.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use oj_daemon::DaemonConfig;
use oj_wire::RpcErrorCode;
use serde_json::Value;

use crate::client::Client;
use crate::exit_error::ExitError;

#[derive(Subcommand)]
pub enum Command {
    /// Report uptime, worker counts, and dispatch state.
    Status,
    /// Ask the daemon to shut down.
    Shutdown {
        #[arg(long)]
        force: bool,
    },
    /// List workers, optionally filtered.
    Workers {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Show a single worker's full record.
    Worker { worker_id: String },
    /// Spawn a new worker.
    Spawn {
        role: String,
        project: PathBuf,
        #[arg(long)]
        town: Option<String>,
        #[arg(long)]
        no_restart: bool,
        #[arg(long)]
        bead_id: Option<String>,
    },
    /// Stop a worker.
    Stop {
        worker_id: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },
    /// Report per-worker health summary counts.
    Health,
    /// Start the dispatch loop for a project.
    DispatchStart {
        project: PathBuf,
        #[arg(long, value_delimiter = ',')]
        roles: Option<Vec<String>>,
        #[arg(long)]
        interval_seconds: Option<u64>,
    },
    /// Stop the dispatch loop.
    DispatchStop,
    /// Report dispatch loop state.
    DispatchStatus,
}

pub async fn run(command: Command) -> Result<()> {
    let client = Client::connect(DaemonConfig::default_location().socket_path());

    let result = match command {
        Command::Status => client.daemon_status().await,
        Command::Shutdown { force } => client.daemon_shutdown(!force).await,
        Command::Workers { status, project, role } => {
            client.worker_list(status.as_deref(), project.as_ref(), role.as_deref()).await
        }
        Command::Worker { worker_id } => client.worker_get(&worker_id).await,
        Command::Spawn { role, project, town, no_restart, bead_id } => {
            client.worker_spawn(&role, &project, town.as_deref(), !no_restart, bead_id.as_deref()).await
        }
        Command::Stop { worker_id, force, timeout_seconds } => {
            client.worker_stop(&worker_id, !force, timeout_seconds).await
        }
        Command::Health => client.health_status().await,
        Command::DispatchStart { project, roles, interval_seconds } => {
            client.dispatch_start(&project, roles.as_deref(), interval_seconds).await
        }
        Command::DispatchStop => client.dispatch_stop().await,
        Command::DispatchStatus => client.dispatch_status().await,
    };

    print_result(result)
}

fn print_result(result: Result<Value, oj_wire::RpcError>) -> Result<()> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) => {
            let code = match err.kind() {
                Some(RpcErrorCode::DaemonNotRunning) => 3,
                Some(RpcErrorCode::RequestTimeout) | Some(RpcErrorCode::ConnectionTimeout) => 4,
                Some(RpcErrorCode::InvalidParams) | Some(RpcErrorCode::InvalidRequest) => 2,
                _ => 1,
            };
            Err(ExitError::new(code, err.message.clone()).into())
        }
    }
}
