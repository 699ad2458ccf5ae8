//! Core Value Types
//!
//! The queue-internal unit of work (`RunRequest`), the admission policy enum
//! (`BlockStrategy`), and the context value handed to in-process job
//! functions (`RunContext`).

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::joblog;

/// Thread-safe, asynchronous job function registered by the host.
/// Takes the run's [`RunContext`] and resolves to the job's outcome.
pub type JobHandlerFn =
    Arc<dyn Fn(RunContext) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// Admission policy applied when a trigger arrives for a job that already
/// has a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStrategy {
    /// Queue behind whatever is pending; strict submission order.
    Serial,
    /// Drop the new trigger if the job is currently running.
    DiscardLater,
    /// Cancel the active run, drop everything pending, run the new trigger.
    CoverEarly,
}

impl BlockStrategy {
    /// Parses the coordinator's wire tag. Unknown tags fall back to serial
    /// execution, the coordinator's own default.
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "DISCARD_LATER" => BlockStrategy::DiscardLater,
            "COVER_EARLY" => BlockStrategy::CoverEarly,
            _ => BlockStrategy::Serial,
        }
    }
}

/// Normalized, queue-internal unit of work derived from a trigger.
///
/// Carries no identity beyond the `log_id`/`log_date_time` pair, which exists
/// purely to correlate the result callback. The cancellation handle is *not*
/// part of this struct: it is created by the consumer immediately before
/// execution begins, so requests still sitting in the queue have nothing to
/// cancel.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub log_id: i64,
    pub log_date_time: i64,
    pub job_name: String,
    /// Resolved script path for script jobs, registered function name for
    /// function jobs.
    pub job_tag: String,
    pub input_params: HashMap<String, String>,
    pub shard_index: i32,
    pub shard_total: i32,
    /// Requested wall-clock budget in seconds. Carried through for the
    /// execution strategy; the queue layer does not enforce it.
    pub timeout_secs: i32,
    pub block_strategy: BlockStrategy,
}

/// Per-run context passed to in-process job functions.
///
/// Exposes the run's log identity, input parameters and sharding fields, a
/// cooperative cancellation token, and an appender for the run's log file.
#[derive(Clone)]
pub struct RunContext {
    pub job_id: i32,
    pub log_id: i64,
    pub job_name: String,
    pub job_tag: String,
    params: HashMap<String, String>,
    shard_index: i32,
    shard_total: i32,
    cancel: CancellationToken,
    log_path: PathBuf,
}

impl RunContext {
    pub(crate) fn new(
        job_id: i32,
        request: &RunRequest,
        cancel: CancellationToken,
        log_path: PathBuf,
    ) -> Self {
        Self {
            job_id,
            log_id: request.log_id,
            job_name: request.job_name.clone(),
            job_tag: request.job_tag.clone(),
            params: request.input_params.clone(),
            shard_index: request.shard_index,
            shard_total: request.shard_total,
            cancel,
            log_path,
        }
    }

    /// Looks up one input parameter by key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|value| value.as_str())
    }

    /// All input parameters.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// `(shard_index, shard_total)` when the trigger was broadcast-sharded,
    /// `(0, 0)` otherwise.
    pub fn sharding(&self) -> (i32, i32) {
        (self.shard_index, self.shard_total)
    }

    /// True once the coordinator has killed this run. Cancellation of
    /// in-process jobs is cooperative: long-running handlers should poll
    /// this (or await [`RunContext::cancelled`]) and wind down.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Appends a line to this run's log file, visible to the coordinator
    /// through its log viewer. Write failures are traced, never fatal.
    pub fn log(&self, message: impl AsRef<str>) {
        if let Err(e) = joblog::append_line(&self.log_path, message.as_ref()) {
            tracing::warn!("failed to append run log {}: {}", self.log_path.display(), e);
        }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("job_id", &self.job_id)
            .field("log_id", &self.log_id)
            .field("job_name", &self.job_name)
            .field("job_tag", &self.job_tag)
            .field("shard_index", &self.shard_index)
            .field("shard_total", &self.shard_total)
            .finish()
    }
}
