//! Run-Log Files
//!
//! Every run writes its output to an append-only log file at
//! `{log_dir}/{YYYY-MM-DD}/{log_id}.log`. Script jobs have their child
//! process stdout/stderr redirected there; function jobs append through
//! [`crate::executor::types::RunContext::log`]. The coordinator reads these
//! files back page by page through the `/log` endpoint.
//!
//! ## Responsibilities
//! - **Path layout**: one directory per calendar day, one file per `log_id`.
//! - **Appending**: create-on-first-write, append-only, timestamped lines.
//! - **Reading**: line-window reads for the coordinator's log viewer.

pub mod reader;


use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

/// Directory holding all run logs for the given instant's calendar day.
pub fn day_dir(log_dir: &Path, at: DateTime<Local>) -> PathBuf {
    log_dir.join(at.format("%Y-%m-%d").to_string())
}

/// Full path of one run's log file under the given day's directory.
pub fn log_file_path(log_dir: &Path, at: DateTime<Local>, log_id: i64) -> PathBuf {
    day_dir(log_dir, at).join(format!("{}.log", log_id))
}

/// Resolves a coordinator-supplied epoch-millisecond timestamp to the log
/// file it addresses. Timestamps before the epoch fall back to today.
pub fn log_file_path_for_millis(log_dir: &Path, log_date_time: i64, log_id: i64) -> PathBuf {
    let at = Local
        .timestamp_millis_opt(log_date_time)
        .single()
        .unwrap_or_else(Local::now);
    log_file_path(log_dir, at, log_id)
}

/// Appends one timestamped line to a run log, creating the file and its
/// day directory on first write.
pub fn append_line(path: &Path, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )
}

/// Opens a run log for appending raw process output, creating parents as
/// needed. Used to redirect script stdout/stderr.
pub fn open_for_append(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
