// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-storage: the embedded, file-backed relational store for `workers` and
//! `towns`.

mod error;
mod filters;
mod schema;
mod store;

pub use error::{Result, StoreError};
pub use filters::WorkerFilter;
pub use store::WorkerStore;
