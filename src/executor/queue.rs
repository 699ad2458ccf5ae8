//! Per-Job Queue and Consumer
//!
//! One `JobQueue` exists per job identity: an ordered pending sequence, at
//! most one active run, and a single-flight consumer task.
//!
//! ## State machine
//! The consumer is guarded by an `Idle -> Running` compare-and-set so that
//! two tasks can never drain the same queue concurrently. The winning task
//! loops: pop head, install a fresh cancellation handle, execute, report,
//! repeat; on finding the queue empty it flips back to `Idle` and exits.
//! After the flip it re-checks the pending sequence so an admit racing the
//! exit cannot strand work.
//!
//! ## Cancellation
//! A kill cancels the active run's handle and drains the pending sequence.
//! The handle is installed *before* the strategy begins meaningful work, so
//! a kill arriving between pop and execute still reaches the run.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tokio_util::sync::CancellationToken;

use super::error::ExecutorError;
use super::reporter::ResultReporter;
use super::strategy::ExecutionStrategy;
use super::types::RunRequest;
use crate::joblog;

struct ActiveRun {
    log_id: i64,
    cancel: CancellationToken,
}

/// Queue and run state for a single job identity. The execution strategy is
/// fixed at creation and never changes for the queue's lifetime.
pub struct JobQueue {
    job_id: i32,
    strategy: ExecutionStrategy,
    pending: Mutex<VecDeque<RunRequest>>,
    running: AtomicBool,
    active: Mutex<Option<ActiveRun>>,
    reporter: Arc<ResultReporter>,
    log_dir: PathBuf,
    callback_on_drain: bool,
}

impl JobQueue {
    pub fn new(
        job_id: i32,
        strategy: ExecutionStrategy,
        reporter: Arc<ResultReporter>,
        log_dir: PathBuf,
        callback_on_drain: bool,
    ) -> Self {
        Self {
            job_id,
            strategy,
            pending: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            active: Mutex::new(None),
            reporter,
            log_dir,
            callback_on_drain,
        }
    }

    pub fn strategy(&self) -> &ExecutionStrategy {
        &self.strategy
    }

    /// True while the consumer is draining this queue.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Busy signal for the idle-probe path: an active run or anything
    /// still pending.
    pub fn has_work(&self) -> bool {
        self.is_running() || !self.pending.lock().unwrap().is_empty()
    }

    pub fn enqueue(&self, request: RunRequest) {
        self.pending.lock().unwrap().push_back(request);
    }

    /// Starts the consumer if it is idle. Only the caller that wins the
    /// `Idle -> Running` transition spawns the loop; everyone else is a
    /// no-op, which makes restarts after drain idempotent.
    pub fn start(self: Arc<Self>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(async move {
                self.consume().await;
            });
        }
    }

    async fn consume(self: Arc<Self>) {
        tracing::debug!("consumer started for job {}", self.job_id);
        loop {
            let next = self.pending.lock().unwrap().pop_front();
            let Some(request) = next else {
                self.running.store(false, Ordering::Release);
                // An admit racing the exit may have enqueued after the empty
                // pop; restart so that work is not stranded until the next
                // trigger.
                if !self.pending.lock().unwrap().is_empty() {
                    self.clone().start();
                }
                tracing::debug!("consumer exited for job {}", self.job_id);
                break;
            };

            let cancel = CancellationToken::new();
            *self.active.lock().unwrap() = Some(ActiveRun {
                log_id: request.log_id,
                cancel: cancel.clone(),
            });

            let outcome = self.strategy.execute(self.job_id, &request, cancel).await;
            self.reporter.report(
                request.log_id,
                request.log_date_time,
                outcome.as_ref().map(|_| ()),
            );

            *self.active.lock().unwrap() = None;
        }
    }

    /// Kill path: cancel the active run (if any) and drop everything still
    /// pending. Drained entries are silent unless the runtime was configured
    /// to report them. The consumer then finds the queue empty and exits on
    /// its own, keeping the state machine single-owner.
    pub fn cancel(&self) {
        let drained: Vec<RunRequest> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain(..).collect()
        };
        if self.callback_on_drain {
            let dropped = ExecutorError::ProcessFailure("job killed before execution".to_string());
            for request in &drained {
                self.reporter
                    .report(request.log_id, request.log_date_time, Err(&dropped));
            }
        } else if !drained.is_empty() {
            tracing::info!(
                "dropped {} pending run(s) for job {}",
                drained.len(),
                self.job_id
            );
        }

        if let Some(active) = self.active.lock().unwrap().as_ref() {
            active.cancel.cancel();
            let notice_path = joblog::log_file_path(&self.log_dir, Local::now(), active.log_id);
            tokio::spawn(async move {
                let _ = joblog::append_line(&notice_path, "job killed by coordinator");
            });
        }
    }
}
