//! Coordinator API Contracts
//!
//! DTOs and endpoint constants for the coordinator-facing HTTP API. Field
//! names follow the coordinator's wire format exactly, including its
//! historical `logDateTim` spelling on the callback record.

use serde::{Deserialize, Serialize};

pub const API_REGISTRY: &str = "api/registry";
pub const API_REGISTRY_REMOVE: &str = "api/registryRemove";
pub const API_CALLBACK: &str = "api/callback";

pub const ACCESS_TOKEN_HEADER: &str = "XXL-JOB-ACCESS-TOKEN";
pub const REGISTRY_GROUP_EXECUTOR: &str = "EXECUTOR";

/// Registration record POSTed on startup and re-POSTed by the heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryParam {
    pub registry_group: String,
    pub registry_key: String,
    pub registry_value: String,
}

/// One result callback record, correlated by the run's log identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleCallbackParam {
    pub log_id: i64,
    #[serde(rename = "logDateTim")]
    pub log_date_tim: i64,
    pub handle_code: i32,
    pub handle_msg: String,
}

/// The coordinator's uniform response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminResponse {
    pub code: i32,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl AdminResponse {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}
