//! `ojd`: the daemon binary. A thin shell around the `oj_daemon` library —
//! resolve the state directory, install logging, detach into the
//! background unless told to stay attached, then run the async event loop
//! until a shutdown signal arrives.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use oj_daemon::dispatch::Dispatcher;
use oj_daemon::manager::WorkerManager;
use oj_daemon::rpc::{RpcContext, RpcServer};
use oj_daemon::spawner::PtySpawner;
use oj_daemon::{env, heartbeat, lifecycle, DaemonConfig};
use oj_storage::WorkerStore;
use tracing_subscriber::EnvFilter;

fn main() {
    let state_dir = env::resolve_state_dir();
    let config = DaemonConfig::new(state_dir);
    if let Err(e) = config.ensure_dirs() {
        eprintln!("failed to create state directory: {e}");
        std::process::exit(1);
    }

    let _log_guard = install_logging(&config.log_file());

    let foreground = std::env::args().nth(1).as_deref() == Some("foreground");
    if !foreground {
        #[cfg(unix)]
        if let Err(e) = lifecycle::daemonize() {
            eprintln!("failed to daemonize: {e}");
            std::process::exit(1);
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!(error = %e, "daemon exited with error");
        std::process::exit(1);
    }
}

fn install_logging(log_file: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let directory = log_file.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = log_file.file_name().unwrap_or_else(|| std::ffi::OsStr::new("daemon.log"));
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    guard
}

async fn run(config: DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let lock = lifecycle::startup(&config)?;
    tracing::info!(pid = std::process::id(), "daemon started");

    let store = Arc::new(WorkerStore::open(config.db_path())?);
    let spawner = Arc::new(PtySpawner::new(config.agent_command.clone()));
    let manager = WorkerManager::new(store, spawner, config.clone());
    let dispatcher = Dispatcher::new(Arc::clone(&manager), config.bd_subprocess_timeout);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let ctx = Arc::new(RpcContext {
        manager: Arc::clone(&manager),
        dispatcher: Arc::clone(&dispatcher),
        started_at: heartbeat::now_epoch_secs(),
        shutdown: Arc::clone(&shutdown),
        shutdown_notify: Arc::clone(&shutdown_notify),
        health_config: config.health,
        worker_stop_grace: config.worker_stop_grace,
        default_dispatch_interval: config.dispatch_interval,
    });

    let server = Arc::new(RpcServer::new(config.socket_path(), config.rpc_idle_timeout, Arc::clone(&ctx)));
    let server_for_task = Arc::clone(&server);
    let server_task = tokio::spawn(async move { server_for_task.run().await });

    let health_loop = tokio::spawn(health_check_loop(Arc::clone(&manager), config.health.health_check_interval_secs, Arc::clone(&shutdown_notify)));

    // Either an OS signal or a `daemon.shutdown` RPC call can trigger
    // shutdown; whichever happens first, make sure the shutdown flag is set
    // and the server's own accept loop (already waiting on the same
    // `Notify`) gets to exit and clean up its socket file before we proceed.
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
        _ = shutdown_notify.notified() => {
            tracing::info!("shutdown requested over rpc");
        }
    }
    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    shutdown_notify.notify_waiters();

    dispatcher.stop();
    manager.cancel_all_pending_restarts();
    manager.stop_all(true, config.worker_stop_grace).await;
    let _ = server_task.await;
    health_loop.abort();
    lifecycle::shutdown(&config, lock)?;
    tracing::info!("daemon shut down cleanly");
    Ok(())
}

async fn health_check_loop<S: oj_daemon::spawner::Spawner + 'static>(
    manager: Arc<WorkerManager<S>>,
    interval_secs: u64,
    shutdown_notify: Arc<tokio::sync::Notify>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = manager.health_check_and_restart().await {
                    tracing::error!(error = %e, "health check iteration failed");
                }
                manager.sweep_worktrees().await;
            }
            _ = shutdown_notify.notified() => return,
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = term.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

