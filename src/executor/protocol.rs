//! Control-Surface Protocol
//!
//! Data Transfer Objects for the coordinator-facing HTTP endpoints. Every
//! response is wrapped in the uniform `ReturnT` envelope; the HTTP layer
//! itself always completes with status 200 and business outcomes live only
//! in the envelope's `code`/`msg` fields.

use serde::{Deserialize, Serialize};

pub const ENDPOINT_BEAT: &str = "/beat";
pub const ENDPOINT_IDLE_BEAT: &str = "/idleBeat";
pub const ENDPOINT_RUN: &str = "/run";
pub const ENDPOINT_KILL: &str = "/kill";
pub const ENDPOINT_LOG: &str = "/log";

/// Envelope code for success and for soft conditions the coordinator must
/// not treat as faults.
pub const SUCCESS_CODE: i32 = 200;
/// Envelope code for hard failures.
pub const FAIL_CODE: i32 = 500;

/// One scheduling request instance sent by the coordinator.
///
/// All fields default so partially filled trigger bodies parse; the
/// coordinator omits script fields for function jobs and vice versa.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerParam {
    pub job_id: i32,
    /// Registered function name; empty for script jobs.
    pub executor_handler: String,
    /// Raw parameter string, interpreted per execution strategy.
    pub executor_params: String,
    pub executor_block_strategy: String,
    /// Requested budget in seconds; carried through, not enforced here.
    pub executor_timeout: i32,
    pub log_id: i64,
    pub log_date_time: i64,
    /// `"BEAN"` for function jobs, a `GLUE_*` language tag for scripts.
    pub glue_type: String,
    pub glue_source: String,
    /// Script version stamp: a changed script arrives with a new value,
    /// producing a new source path on disk.
    pub glue_updatetime: i64,
    pub broadcast_index: i32,
    pub broadcast_total: i32,
}

/// Body of `/idleBeat` and `/kill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdParam {
    pub job_id: i32,
}

/// Body of `/log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    #[serde(rename = "logDateTim")]
    pub log_date_tim: i64,
    pub log_id: i64,
    pub from_line_num: i32,
}

/// Uniform response envelope for every control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnT {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl ReturnT {
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: "success".to_string(),
            content: None,
        }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            code: FAIL_CODE,
            msg: msg.into(),
            content: None,
        }
    }

    pub fn with_content(content: serde_json::Value) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: "success".to_string(),
            content: Some(content),
        }
    }
}
