//! Control-Surface Handlers
//!
//! Maps the coordinator's inbound control requests onto registry operations
//! and formats the uniform response envelope. Bodies are parsed by hand so
//! that malformed requests still complete at the HTTP layer and surface
//! their error through the envelope, never as a transport-level failure.

use std::sync::Arc;

use axum::{Extension, Json};

use super::protocol::{JobIdParam, LogRequest, ReturnT, TriggerParam};
use super::registry::JobRegistry;
use crate::config::ExecutorConfig;
use crate::joblog;

/// Liveness probe from the coordinator.
pub async fn handle_beat() -> Json<ReturnT> {
    Json(ReturnT::success())
}

/// Busy probe: a non-success code tells the coordinator this job still has
/// an active run or queued triggers, so it should route elsewhere or wait.
pub async fn handle_idle_beat(
    Extension(registry): Extension<Arc<JobRegistry>>,
    body: String,
) -> Json<ReturnT> {
    let param: JobIdParam = match serde_json::from_str(&body) {
        Ok(param) => param,
        Err(e) => return Json(ReturnT::fail(e.to_string())),
    };

    if registry.has_running(param.job_id) {
        return Json(ReturnT::fail("the server busy"));
    }
    Json(ReturnT::success())
}

/// Trigger admission. Accepted triggers return immediately; execution is
/// asynchronous. Admission failures surface here in the envelope and
/// asynchronously through the registry's result callback.
pub async fn handle_run(
    Extension(registry): Extension<Arc<JobRegistry>>,
    body: String,
) -> Json<ReturnT> {
    let trigger: TriggerParam = match serde_json::from_str(&body) {
        Ok(trigger) => trigger,
        Err(e) => {
            tracing::warn!("unparseable trigger body: {}", e);
            return Json(ReturnT::fail(e.to_string()));
        }
    };

    let log_id = trigger.log_id;
    match registry.admit(trigger).await {
        Ok(()) => Json(ReturnT::success()),
        Err(e) => {
            tracing::warn!("trigger admission failed for log {}: {}", log_id, e);
            Json(ReturnT::fail(e.to_string()))
        }
    }
}

/// Kill request: cancel the job's active run and drop its queue contents.
pub async fn handle_kill(
    Extension(registry): Extension<Arc<JobRegistry>>,
    body: String,
) -> Json<ReturnT> {
    let param: JobIdParam = match serde_json::from_str(&body) {
        Ok(param) => param,
        Err(e) => return Json(ReturnT::fail(e.to_string())),
    };

    registry.cancel(param.job_id);
    Json(ReturnT::success())
}

/// Log page read for the coordinator's log viewer.
pub async fn handle_log(
    Extension(config): Extension<Arc<ExecutorConfig>>,
    body: String,
) -> Json<ReturnT> {
    let request: LogRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => return Json(ReturnT::fail(e.to_string())),
    };

    let window = joblog::reader::read_window(
        &config.log_dir,
        request.log_date_tim,
        request.log_id,
        request.from_line_num,
    );

    match serde_json::to_value(&window) {
        Ok(content) => Json(ReturnT::with_content(content)),
        Err(e) => Json(ReturnT::fail(e.to_string())),
    }
}
