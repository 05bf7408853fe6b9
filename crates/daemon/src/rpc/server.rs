//! Unix-socket RPC server: binds the well-known socket path, accepts
//! connections concurrently, and runs one read-dispatch-write loop per
//! connection until the peer disconnects, the idle timeout fires, or
//! shutdown is requested.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use oj_wire::{read_message, write_message, FramingError, Request, Response, RpcError};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use super::context::RpcContext;
use super::handlers;
use crate::spawner::Spawner;

pub struct RpcServer<S: Spawner> {
    socket_path: PathBuf,
    idle_timeout: Duration,
    ctx: Arc<RpcContext<S>>,
}

impl<S: Spawner + 'static> RpcServer<S> {
    pub fn new(socket_path: PathBuf, idle_timeout: Duration, ctx: Arc<RpcContext<S>>) -> Self {
        Self { socket_path, idle_timeout, ctx }
    }

    /// Bind the socket (removing a stale one first), restrict it to
    /// owner-only permissions, and serve connections until shutdown is
    /// requested. Unlinks the socket on the way out.
    pub async fn run(&self) -> std::io::Result<()> {
        remove_stale_socket(&self.socket_path)?;
        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        info!(path = %self.socket_path.display(), "rpc server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            if self.ctx.shutdown.load(Ordering::SeqCst) {
                                drop(stream);
                                continue;
                            }
                            let ctx = Arc::clone(&self.ctx);
                            let idle_timeout = self.idle_timeout;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, ctx, idle_timeout).await {
                                    debug!(error = %e, "connection ended");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = self.ctx.shutdown_notify.notified() => {
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    /// Graceful stop: signal shutdown, wait up to `grace` for in-flight
    /// connections to finish on their own. Does not forcibly cancel them —
    /// the idle timeout on each connection bounds how long that can take.
    pub async fn stop(&self, grace: Duration) {
        self.ctx.shutdown.store(true, Ordering::SeqCst);
        self.ctx.shutdown_notify.notify_waiters();
        tokio::time::sleep(grace.min(Duration::from_secs(5))).await;
    }
}

async fn handle_connection<S: Spawner + 'static>(
    mut stream: UnixStream,
    ctx: Arc<RpcContext<S>>,
    idle_timeout: Duration,
) -> std::io::Result<()> {
    loop {
        let body = match tokio::time::timeout(idle_timeout, read_message(&mut stream)).await {
            Ok(Ok(body)) => body,
            Ok(Err(FramingError::Closed)) => return Ok(()),
            Ok(Err(FramingError::TooLarge(len))) => {
                let resp = Response::err("".to_string(), RpcError::invalid_request(format!("message of {len} bytes exceeds limit")));
                let _ = write_response(&mut stream, &resp).await;
                return Ok(());
            }
            Ok(Err(FramingError::Io(e))) => return Err(e),
            Err(_elapsed) => {
                debug!("connection idle timeout reached");
                return Ok(());
            }
        };

        let req: Request = match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                let resp = Response::err("".to_string(), RpcError::parse_error(e.to_string()));
                write_response(&mut stream, &resp).await?;
                continue;
            }
        };

        if ctx.shutdown.load(Ordering::SeqCst) {
            let resp = Response::err(req.id, RpcError::daemon_shutting_down());
            write_response(&mut stream, &resp).await?;
            continue;
        }

        let resp = handlers::dispatch(&ctx, req).await;
        write_response(&mut stream, &resp).await?;
    }
}

async fn write_response(stream: &mut UnixStream, resp: &Response) -> std::io::Result<()> {
    let body = serde_json::to_vec(resp)?;
    write_message(stream, &body).await.map_err(|e| match e {
        FramingError::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    })
}

fn remove_stale_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            warn!(path = %path.display(), "removed stale socket from a prior run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
