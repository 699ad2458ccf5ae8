//! Job Registry
//!
//! The process-wide owner of both maps: job identity -> queue, and function
//! name -> handler. Implements the admission policy (blocking strategies)
//! and cancellation, and is the single entry point the protocol layer talks
//! to.
//!
//! ## Concurrency
//! Both maps are concurrent; queue references, once created, are stable for
//! the registry's lifetime (entries are only removed by a full reset), so
//! steady-state admission is a lock-free read followed by per-queue work. A
//! slow job never blocks registry operations on other job identities: the
//! only mutual exclusion held across execution is the queue's own
//! `Idle/Running` state.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::error::ExecutorError;
use super::protocol::TriggerParam;
use super::queue::JobQueue;
use super::reporter::ResultReporter;
use super::strategy::ExecutionStrategy;
use super::types::{BlockStrategy, JobHandlerFn};
use crate::config::ExecutorConfig;

pub struct JobRegistry {
    queues: DashMap<i32, Arc<JobQueue>>,
    handlers: DashMap<String, JobHandlerFn>,
    reporter: Arc<ResultReporter>,
    glue_source_dir: PathBuf,
    log_dir: PathBuf,
    callback_on_drain: bool,
}

impl JobRegistry {
    pub fn new(config: &ExecutorConfig, reporter: Arc<ResultReporter>) -> Arc<Self> {
        Arc::new(Self {
            queues: DashMap::new(),
            handlers: DashMap::new(),
            reporter,
            glue_source_dir: config.glue_source_dir.clone(),
            log_dir: config.log_dir.clone(),
            callback_on_drain: config.callback_on_drain,
        })
    }

    pub fn reporter(&self) -> &Arc<ResultReporter> {
        &self.reporter
    }

    /// Adds a named job function. Configuration-time only: must be called
    /// before the registry starts serving triggers.
    pub fn register_job(&self, name: &str, handler: JobHandlerFn) -> Result<(), ExecutorError> {
        match self.handlers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ExecutorError::DuplicateHandler(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                tracing::info!("registered job handler: {}", name);
                Ok(())
            }
        }
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Admission entry point for one trigger.
    ///
    /// Creates the job's queue on first sight (strategy variant chosen by
    /// whether the trigger names a registered function), then applies the
    /// trigger's blocking strategy, parses it into a run request, enqueues,
    /// and starts the consumer if idle.
    ///
    /// Every admission failure also emits a callback record: the
    /// coordinator correlates outcomes by log id and would otherwise wait
    /// forever on a trigger that was rejected at the door.
    pub async fn admit(&self, trigger: TriggerParam) -> Result<(), ExecutorError> {
        let log_id = trigger.log_id;
        let log_date_time = trigger.log_date_time;
        match self.try_admit(trigger).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reporter.report(log_id, log_date_time, Err(&e));
                Err(e)
            }
        }
    }

    async fn try_admit(&self, trigger: TriggerParam) -> Result<(), ExecutorError> {
        let queue = match self.queues.get(&trigger.job_id) {
            Some(existing) => existing.value().clone(),
            None => self.create_queue(&trigger)?,
        };

        match BlockStrategy::from_wire(&trigger.executor_block_strategy) {
            BlockStrategy::DiscardLater if queue.is_running() => {
                return Err(ExecutorError::BlockStrategyRejection {
                    job_id: trigger.job_id,
                });
            }
            BlockStrategy::CoverEarly if queue.is_running() => {
                tracing::info!(
                    "cover-early trigger for job {}: replacing active run",
                    trigger.job_id
                );
                queue.cancel();
            }
            _ => {}
        }

        let request = queue.strategy().parse(&trigger).await?;
        queue.enqueue(request);
        queue.start();
        Ok(())
    }

    fn create_queue(&self, trigger: &TriggerParam) -> Result<Arc<JobQueue>, ExecutorError> {
        let strategy = if trigger.executor_handler.is_empty() {
            ExecutionStrategy::script(self.glue_source_dir.clone(), self.log_dir.clone())
        } else {
            let handler = self
                .handlers
                .get(&trigger.executor_handler)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| ExecutorError::HandlerNotFound(trigger.executor_handler.clone()))?;
            ExecutionStrategy::function(
                trigger.executor_handler.clone(),
                handler,
                self.log_dir.clone(),
            )
        };

        let queue = Arc::new(JobQueue::new(
            trigger.job_id,
            strategy,
            self.reporter.clone(),
            self.log_dir.clone(),
            self.callback_on_drain,
        ));

        // First creation wins under concurrent admits for the same job; the
        // loser's queue is dropped before anything was enqueued on it.
        Ok(self
            .queues
            .entry(trigger.job_id)
            .or_insert(queue)
            .value()
            .clone())
    }

    /// Busy/backpressure signal for the idle-probe path.
    pub fn has_running(&self, job_id: i32) -> bool {
        self.queues
            .get(&job_id)
            .map(|queue| queue.has_work())
            .unwrap_or(false)
    }

    /// Kill path. Unknown job ids are a no-op: nothing to stop, no callback,
    /// no error.
    pub fn cancel(&self, job_id: i32) {
        if let Some(queue) = self.queues.get(&job_id) {
            tracing::info!("job {} killed by coordinator", job_id);
            queue.cancel();
        }
    }

    /// Clears both maps. Used when the host unregisters from the
    /// coordinator; subsequent triggers behave as if the process had just
    /// started.
    pub fn reset(&self) {
        self.queues.clear();
        self.handlers.clear();
    }
}
