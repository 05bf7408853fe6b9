//! RPC client: a small bounded pool of reusable connections to the daemon's
//! socket, with a per-call timeout covering connect + send + receive.

use std::path::PathBuf;
use std::time::Duration;

use nanoid::nanoid;
use oj_wire::{read_message, write_message, FramingError, Request, Response, RpcError};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::UnixStream;

pub struct RpcClient {
    socket_path: PathBuf,
    pool: Mutex<Vec<UnixStream>>,
    pool_size: usize,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(socket_path: PathBuf, pool_size: usize, timeout: Duration) -> Self {
        Self { socket_path, pool: Mutex::new(Vec::new()), pool_size, timeout }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        tokio::time::timeout(self.timeout, self.call_inner(method, params))
            .await
            .map_err(|_| RpcError::new(oj_wire::RpcErrorCode::RequestTimeout, format!("{method} timed out")))?
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut stream = self.checkout_connection().await?;
        let req = Request::new(nanoid!(10), method, params);
        let body = serde_json::to_vec(&req).map_err(|e| RpcError::internal_error(e.to_string()))?;

        if write_message(&mut stream, &body).await.is_err() {
            return Err(RpcError::daemon_not_running());
        }

        let resp_body = match read_message(&mut stream).await {
            Ok(body) => body,
            Err(FramingError::Closed) => return Err(RpcError::daemon_not_running()),
            Err(e) => return Err(RpcError::internal_error(e.to_string())),
        };
        let resp: Response = serde_json::from_slice(&resp_body).map_err(|e| RpcError::internal_error(e.to_string()))?;

        self.checkin_connection(stream);
        resp.into_result()
    }

    async fn checkout_connection(&self) -> Result<UnixStream, RpcError> {
        if let Some(stream) = self.pool.lock().pop() {
            return Ok(stream);
        }
        UnixStream::connect(&self.socket_path).await.map_err(|_| RpcError::daemon_not_running())
    }

    fn checkin_connection(&self, stream: UnixStream) {
        let mut pool = self.pool.lock();
        if pool.len() < self.pool_size {
            pool.push(stream);
        }
    }
}
