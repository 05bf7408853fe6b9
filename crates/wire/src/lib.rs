//! IPC Protocol for daemon communication.
//!
//! Wire format: 4-byte big-endian length prefix + UTF-8 JSON payload.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod framing;
mod message;

pub use error::{RpcError, RpcErrorCode};
pub use framing::{read_message, write_message, FramingError, MAX_MESSAGE_BYTES};
pub use message::{Request, Response};
