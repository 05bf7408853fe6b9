//! JSON-RPC-compatible error codes, plus the daemon's four client-side
//! extensions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    DaemonNotRunning,
    ConnectionTimeout,
    RequestTimeout,
    DaemonShuttingDown,
}

impl RpcErrorCode {
    pub fn code(self) -> i32 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::DaemonNotRunning => -32000,
            RpcErrorCode::ConnectionTimeout => -32001,
            RpcErrorCode::RequestTimeout => -32002,
            RpcErrorCode::DaemonShuttingDown => -32003,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -32700 => RpcErrorCode::ParseError,
            -32600 => RpcErrorCode::InvalidRequest,
            -32601 => RpcErrorCode::MethodNotFound,
            -32602 => RpcErrorCode::InvalidParams,
            -32603 => RpcErrorCode::InternalError,
            -32000 => RpcErrorCode::DaemonNotRunning,
            -32001 => RpcErrorCode::ConnectionTimeout,
            -32002 => RpcErrorCode::RequestTimeout,
            -32003 => RpcErrorCode::DaemonShuttingDown,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self { code: code.code(), message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(RpcErrorCode::MethodNotFound, format!("method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    pub fn daemon_not_running() -> Self {
        Self::new(RpcErrorCode::DaemonNotRunning, "daemon not running — start it with `ojd`")
    }

    pub fn daemon_shutting_down() -> Self {
        Self::new(RpcErrorCode::DaemonShuttingDown, "daemon is shutting down")
    }

    pub fn kind(&self) -> Option<RpcErrorCode> {
        RpcErrorCode::from_code(self.code)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
