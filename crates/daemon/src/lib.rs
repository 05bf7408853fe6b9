// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-daemon: the orchestration core. Owns worker lifecycle (spawn, stop,
//! heartbeat-based crash detection, exponential-backoff auto-restart), the
//! RPC transport workers and operators talk to it over, and the dispatch
//! loop that spawns single-task workers against an external work queue.
//!
//! Built bottom-up: storage (via `oj-storage`), `spawner`, `manager`,
//! `rpc`, then `dispatch` + `lifecycle` tying it all together.

pub mod bd;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod heartbeat;
pub mod lifecycle;
pub mod manager;
pub mod rpc;
pub mod spawner;

pub use config::DaemonConfig;
pub use dispatch::{DispatchConfig, DispatchStatus, Dispatcher};
pub use manager::{SpawnParams, WorkerManager};
