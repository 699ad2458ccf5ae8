//! Executor Error Taxonomy
//!
//! Every failure the admission and execution paths can produce. Admission
//! errors reject a trigger before any resource is used; execution errors are
//! reported through the callback channel after the fact. The one *temporary*
//! condition is a blocking-strategy rejection: the trigger never ran and the
//! coordinator must not count it as an execution fault.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The trigger carries a script language tag this executor cannot run.
    #[error("unsupported glue type: {0}")]
    UnsupportedGlueType(String),

    /// The trigger names a job function the host never registered.
    #[error("job handler not found: {0}")]
    HandlerNotFound(String),

    /// A job function was registered twice under the same name.
    #[error("job handler already registered: {0}")]
    DuplicateHandler(String),

    /// Persisting a glue source or opening a run log failed.
    #[error("file io error: {0}")]
    FileIo(#[from] std::io::Error),

    /// A script process failed to spawn, was killed, or exited non-zero.
    #[error("process failure: {0}")]
    ProcessFailure(String),

    /// A registered job function returned an error.
    #[error("job handler failed: {0}")]
    HandlerFailed(String),

    /// A registered job function panicked; the panic was contained and the
    /// consumer loop kept running.
    #[error("job handler panicked: {0}")]
    PanicRecovered(String),

    /// The trigger was discarded because the job is already running and its
    /// blocking strategy forbids queueing behind it.
    #[error("job {job_id} is running, trigger discarded")]
    BlockStrategyRejection { job_id: i32 },
}

impl ExecutorError {
    /// True for soft/temporary conditions: the request never ran, and the
    /// callback must not present it as an execution fault.
    pub fn is_temporary(&self) -> bool {
        matches!(self, ExecutorError::BlockStrategyRejection { .. })
    }
}
