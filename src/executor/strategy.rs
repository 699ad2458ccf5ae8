//! Execution Strategies
//!
//! The closed Script/Function polymorphism governing how a trigger is
//! normalized into a [`RunRequest`] and how that request is executed. A
//! queue picks its variant once, at creation time, and keeps it for life:
//!
//! - **Script**: the trigger carries source code in a supported language.
//!   The source is materialized on disk (one file per `(job_id,
//!   glue_updatetime)` version), then run as a child process whose output is
//!   redirected into the run's log file. Cancellation kills the process.
//! - **Function**: the trigger names a function the host registered. The
//!   function runs in-process on its own task with an explicit
//!   [`RunContext`]; panics are contained and surface as ordinary failures.
//!   Cancellation is cooperative through the context token.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Local;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::ExecutorError;
use super::protocol::TriggerParam;
use super::types::{BlockStrategy, JobHandlerFn, RunContext, RunRequest};
use crate::joblog;

/// Language tag -> (file extension, interpreter command).
const GLUE_TABLE: &[(&str, &str, &str)] = &[
    ("GLUE_SHELL", ".sh", "bash"),
    ("GLUE_PYTHON", ".py", "python3"),
    ("GLUE_PHP", ".php", "php"),
    ("GLUE_NODEJS", ".js", "node"),
    ("GLUE_POWERSHELL", ".ps1", "powershell"),
];

fn glue_entry(glue_type: &str) -> Option<(&'static str, &'static str)> {
    GLUE_TABLE
        .iter()
        .find(|(tag, _, _)| *tag == glue_type)
        .map(|(_, ext, cmd)| (*ext, *cmd))
}

fn interpreter_for(script_path: &Path) -> Option<&'static str> {
    let name = script_path.file_name()?.to_str()?;
    GLUE_TABLE
        .iter()
        .find(|(_, ext, _)| name.ends_with(ext))
        .map(|(_, _, cmd)| *cmd)
}

/// Parses a raw `key=value,key=value` parameter string into a map.
///
/// Keys are unique with the last occurrence winning; segments without `=`
/// and empty segments are silently dropped, never an error.
pub fn parse_input_params(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for segment in raw.split(',') {
        if segment.is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once('=') {
            params.insert(key.to_string(), value.to_string());
        }
    }
    params
}

/// The execution variant a queue is bound to.
pub enum ExecutionStrategy {
    Script(ScriptRunner),
    Function(FunctionRunner),
}

impl ExecutionStrategy {
    pub fn script(glue_source_dir: PathBuf, log_dir: PathBuf) -> Self {
        ExecutionStrategy::Script(ScriptRunner {
            glue_source_dir,
            log_dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn function(name: String, handler: JobHandlerFn, log_dir: PathBuf) -> Self {
        ExecutionStrategy::Function(FunctionRunner {
            name,
            handler,
            log_dir,
        })
    }

    /// Normalizes a trigger into the queue-internal run request.
    pub async fn parse(&self, trigger: &TriggerParam) -> Result<RunRequest, ExecutorError> {
        match self {
            ExecutionStrategy::Script(runner) => runner.parse(trigger).await,
            ExecutionStrategy::Function(runner) => Ok(runner.parse(trigger)),
        }
    }

    /// Runs one request to completion under the given cancellation handle.
    pub async fn execute(
        &self,
        job_id: i32,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<(), ExecutorError> {
        match self {
            ExecutionStrategy::Script(runner) => runner.execute(job_id, request, cancel).await,
            ExecutionStrategy::Function(runner) => runner.execute(job_id, request, cancel).await,
        }
    }
}

/// Script-mode execution: persisted glue source + child process.
pub struct ScriptRunner {
    glue_source_dir: PathBuf,
    log_dir: PathBuf,
    /// Serializes source-file creation; concurrent triggers for the same
    /// script version must not interleave partial writes.
    write_lock: tokio::sync::Mutex<()>,
}

impl ScriptRunner {
    /// Resolves the source path for this trigger's script version, writing
    /// the glue source on first sight. A later trigger with the same
    /// `glue_updatetime` reuses the existing file untouched; a changed
    /// script arrives with a new updatetime and lands at a new path.
    pub async fn parse(&self, trigger: &TriggerParam) -> Result<RunRequest, ExecutorError> {
        let (extension, _) = glue_entry(&trigger.glue_type)
            .ok_or_else(|| ExecutorError::UnsupportedGlueType(trigger.glue_type.clone()))?;

        let path = self.glue_source_dir.join(format!(
            "{}_{}{}",
            trigger.job_id, trigger.glue_updatetime, extension
        ));

        if !path.exists() {
            let _guard = self.write_lock.lock().await;
            // Double-check after the lock: a concurrent writer may have won.
            if !path.exists() {
                tracing::info!(
                    "materializing script source for job {} at {}",
                    trigger.job_id,
                    path.display()
                );
                std::fs::create_dir_all(&self.glue_source_dir)?;
                std::fs::write(&path, &trigger.glue_source)?;
            }
        }

        let mut input_params = HashMap::new();
        if !trigger.executor_params.is_empty() {
            input_params.insert("param".to_string(), trigger.executor_params.clone());
        }

        let mut request = RunRequest {
            log_id: trigger.log_id,
            log_date_time: trigger.log_date_time,
            job_name: trigger.executor_handler.clone(),
            job_tag: path.to_string_lossy().into_owned(),
            input_params,
            shard_index: 0,
            shard_total: 0,
            timeout_secs: trigger.executor_timeout,
            block_strategy: BlockStrategy::from_wire(&trigger.executor_block_strategy),
        };
        if trigger.broadcast_total > 0 {
            request.shard_index = trigger.broadcast_index;
            request.shard_total = trigger.broadcast_total;
        }
        Ok(request)
    }

    /// Spawns the interpreter on the materialized script with the argument
    /// list `[script_path, raw_params, shard_index, shard_total]`, output
    /// appended to the run's log file. Cancellation kills the child.
    pub async fn execute(
        &self,
        job_id: i32,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<(), ExecutorError> {
        let script_path = PathBuf::from(&request.job_tag);
        let interpreter = interpreter_for(&script_path).ok_or_else(|| {
            ExecutorError::ProcessFailure(format!(
                "no interpreter for script {}",
                script_path.display()
            ))
        })?;

        let log_path = joblog::log_file_path(&self.log_dir, Local::now(), request.log_id);
        let log_file = joblog::open_for_append(&log_path)?;
        let log_file_err = log_file.try_clone()?;

        let raw_params = request
            .input_params
            .get("param")
            .cloned()
            .unwrap_or_default();

        tracing::info!(
            "script execute. job_id:{} log_id:{} cmd:{} {}",
            job_id,
            request.log_id,
            interpreter,
            script_path.display()
        );

        let mut child = Command::new(interpreter)
            .arg(&script_path)
            .arg(&raw_params)
            .arg(request.shard_index.to_string())
            .arg(request.shard_total.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()
            .map_err(|e| ExecutorError::ProcessFailure(format!("failed to spawn script: {}", e)))?;

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        match waited {
            Some(Ok(status)) if status.success() => Ok(()),
            Some(Ok(status)) => Err(ExecutorError::ProcessFailure(format!(
                "script exited with {}",
                status
            ))),
            Some(Err(e)) => Err(ExecutorError::ProcessFailure(format!(
                "script wait failed: {}",
                e
            ))),
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill script for job {}: {}", job_id, e);
                }
                Err(ExecutorError::ProcessFailure(
                    "script killed by coordinator".to_string(),
                ))
            }
        }
    }
}

/// Function-mode execution: a host-registered async function, invoked with
/// an explicit run context.
pub struct FunctionRunner {
    name: String,
    handler: JobHandlerFn,
    log_dir: PathBuf,
}

impl FunctionRunner {
    pub fn parse(&self, trigger: &TriggerParam) -> RunRequest {
        let mut request = RunRequest {
            log_id: trigger.log_id,
            log_date_time: trigger.log_date_time,
            job_name: trigger.executor_handler.clone(),
            job_tag: self.name.clone(),
            input_params: parse_input_params(&trigger.executor_params),
            shard_index: 0,
            shard_total: 0,
            timeout_secs: trigger.executor_timeout,
            block_strategy: BlockStrategy::from_wire(&trigger.executor_block_strategy),
        };
        if trigger.broadcast_total > 0 {
            request.shard_index = trigger.broadcast_index;
            request.shard_total = trigger.broadcast_total;
        }
        request
    }

    /// Invokes the registered function on its own task. A panic inside the
    /// function is contained at the join boundary and reported as an
    /// ordinary failure; the calling consumer loop keeps running.
    pub async fn execute(
        &self,
        job_id: i32,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<(), ExecutorError> {
        let log_path = joblog::log_file_path(&self.log_dir, Local::now(), request.log_id);
        let context = RunContext::new(job_id, request, cancel, log_path);
        let handler = self.handler.clone();

        let join = tokio::spawn(async move { handler(context).await });
        match join.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ExecutorError::HandlerFailed(format!("{:#}", e))),
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("job {} handler panicked: {}", job_id, msg);
                Err(ExecutorError::PanicRecovered(msg))
            }
            Err(join_err) => Err(ExecutorError::ProcessFailure(format!(
                "handler task aborted: {}",
                join_err
            ))),
        }
    }
}
