//! Executor-Side Job Runtime Library
//!
//! This library crate implements the executor half of a coordinator-driven job
//! scheduling protocol. It is embedded into a host application: the host
//! registers named job functions, supplies a configuration, and starts the
//! runtime. From then on the runtime serves trigger/kill/probe requests from
//! the central coordinator, runs jobs under per-job admission policies, and
//! reports every outcome back asynchronously.
//!
//! ## Architecture Modules
//! The crate is composed of three subsystems plus the host-facing facade:
//!
//! - **`executor`**: The admission/queueing/execution core. Per-job FIFO
//!   queues with a single-flight consumer each, blocking-strategy admission
//!   (serial, discard-newer, cancel-and-replace), the script/function
//!   execution strategies, cancellation, and the HTTP control handlers.
//! - **`admin`**: The coordinator client. Registers this executor, keeps a
//!   heartbeat loop alive, and delivers batched result callbacks.
//! - **`joblog`**: Date-partitioned, append-only run-log files, written
//!   during execution and served back to the coordinator page by page.
//! - **`client`**: `ExecutorClient`, the facade a host application uses to
//!   wire everything together and run the server.

pub mod admin;
pub mod client;
pub mod config;
pub mod executor;
pub mod joblog;

pub use client::ExecutorClient;
pub use config::ExecutorConfig;
pub use executor::error::ExecutorError;
pub use executor::types::{BlockStrategy, RunContext};
