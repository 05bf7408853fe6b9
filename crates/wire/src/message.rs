//! `Request`/`Response` envelopes. `id` correlates a response to exactly one
//! prior request on the same connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self { id: id.into(), method: method.into(), params }
    }

    pub fn params_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, RpcError> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| RpcError::invalid_params(format!("{e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self { id: id.into(), result: Some(result), error: None }
    }

    pub fn err(id: impl Into<String>, error: RpcError) -> Self {
        Self { id: id.into(), result: None, error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
