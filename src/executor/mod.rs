//! Job Admission, Queueing and Execution Core
//!
//! This module is the engine of the executor runtime: it decides whether a
//! trigger is admitted, keeps per-job FIFO queues with single-flight
//! consumers, runs the work through the script/function execution
//! strategies, and reports every outcome for callback delivery.
//!
//! ## Architecture Overview
//! 1. **Admission**: the protocol layer hands a trigger to the
//!    [`registry::JobRegistry`]. The job's queue is created lazily on first
//!    sight, with its execution variant fixed for life. Triggers for a busy
//!    job are queued, discarded, or replace the active run according to
//!    their blocking strategy.
//! 2. **Consumption**: each [`queue::JobQueue`] runs at most one consumer,
//!    guarded by an `Idle -> Running` compare-and-set. The consumer drains
//!    the pending sequence in FIFO order, one run at a time.
//! 3. **Execution**: a [`strategy::ExecutionStrategy`] turns the trigger
//!    into a normalized run request and executes it — a child process for
//!    script jobs, a registered in-process function for function jobs —
//!    under a per-run cancellation handle.
//! 4. **Reporting**: the [`reporter::ResultReporter`] converts each outcome
//!    into a callback record for asynchronous delivery to the coordinator.
//!
//! ## Submodules
//! - **`types`**: run request, run context, admission policy enum.
//! - **`error`**: the typed failure taxonomy.
//! - **`strategy`**: the Script/Function parse+execute pair.
//! - **`queue`**: per-job pending sequence and consumer state machine.
//! - **`registry`**: the identity->queue and name->handler maps.
//! - **`reporter`**: outcome -> callback record conversion.
//! - **`protocol`**: control-surface DTOs and the response envelope.
//! - **`handlers`**: axum handlers for the control endpoints.

pub mod error;
pub mod handlers;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod reporter;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;
