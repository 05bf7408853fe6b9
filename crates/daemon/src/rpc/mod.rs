//! RPC transport: the local stream-socket server, the client's connection
//! pool, the shared handler context, and the method dispatch table.

pub mod client;
pub mod context;
mod handlers;
pub mod server;

pub use client::RpcClient;
pub use context::RpcContext;
pub use server::RpcServer;
