//! Result Reporter
//!
//! Converts every run outcome into a callback record and hands it to the
//! delivery channel drained by the coordinator client. Reporting is
//! fire-and-forget from the queue's perspective: a closed channel drops the
//! record with a trace, never an error.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::error::ExecutorError;
use super::protocol::{FAIL_CODE, SUCCESS_CODE};
use crate::admin::protocol::HandleCallbackParam;

pub struct ResultReporter {
    tx: UnboundedSender<HandleCallbackParam>,
}

impl ResultReporter {
    /// Creates the reporter plus the receiving half the delivery loop drains.
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<HandleCallbackParam>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    /// Queues one callback record for the given run.
    ///
    /// Code mapping: success and soft/temporary rejections both carry the
    /// success code (the coordinator must not count a blocking-strategy
    /// rejection as an execution fault; the message still explains it), hard
    /// failures carry the failure code with the error text.
    pub fn report(&self, log_id: i64, log_date_time: i64, outcome: Result<(), &ExecutorError>) {
        let callback = match outcome {
            Ok(()) => HandleCallbackParam {
                log_id,
                log_date_tim: log_date_time,
                handle_code: SUCCESS_CODE,
                handle_msg: "success".to_string(),
            },
            Err(e) if e.is_temporary() => HandleCallbackParam {
                log_id,
                log_date_tim: log_date_time,
                handle_code: SUCCESS_CODE,
                handle_msg: e.to_string(),
            },
            Err(e) => HandleCallbackParam {
                log_id,
                log_date_tim: log_date_time,
                handle_code: FAIL_CODE,
                handle_msg: e.to_string(),
            },
        };

        if self.tx.send(callback).is_err() {
            tracing::debug!("callback channel closed, dropping result for log {}", log_id);
        }
    }
}
