//! Log Window Reads
//!
//! Serves the coordinator's log viewer: given a run's `log_date_time` and
//! `log_id` plus a starting line, return the remaining lines of the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One page of a run log, as returned through the `/log` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResult {
    pub from_line_num: i32,
    pub to_line_num: i32,
    pub log_content: String,
    pub is_end: bool,
}

/// Reads a run log from `from_line` (1-indexed) to the current end of file.
///
/// A missing or empty file yields an empty window with `is_end` set, which
/// the coordinator renders as "no more output". Read failures degrade the
/// same way rather than erroring the protocol surface.
pub fn read_window(log_dir: &Path, log_date_time: i64, log_id: i64, from_line: i32) -> LogResult {
    let path = super::log_file_path_for_millis(log_dir, log_date_time, log_id);
    let from_line = from_line.max(1);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("run log {} not readable: {}", path.display(), e);
            return LogResult {
                from_line_num: from_line,
                to_line_num: from_line,
                log_content: String::new(),
                is_end: true,
            };
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len() as i32;
    let window: Vec<&str> = lines
        .iter()
        .skip((from_line - 1) as usize)
        .copied()
        .collect();

    LogResult {
        from_line_num: from_line,
        to_line_num: total.max(from_line),
        log_content: window.join("\n"),
        is_end: true,
    }
}
