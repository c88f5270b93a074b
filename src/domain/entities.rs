//! # Domain Entities
//!
//! Entities are the "Nouns" of the exporter: the records handed to us by the
//! processing framework, the identity of the task attempt doing the work, and
//! the results we report once the attempt finishes.
//!
//! Reportable structs derive `Serialize` so the job report can be written
//! as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One record yielded by the framework.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// An already-delimited line of text. Written as-is plus a newline.
    Text(String),
    /// A typed record whose fields are rendered with the session's delimiters.
    /// `None` is a SQL NULL and is written as the null-value token.
    Fields(Vec<Option<String>>),
}

/// Identity and working area of one task attempt.
///
/// Handed to the session by whatever framework runs it; every log line a
/// session emits is prefixed with `task_attempt_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub job_id: String,
    pub task_attempt_id: String,
    /// Local working directory owned by this attempt. Discarded with it.
    pub work_dir: PathBuf,
}

impl TaskContext {
    pub fn new(job_id: &str, task_attempt_id: &str, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_id: job_id.to_string(),
            task_attempt_id: task_attempt_id.to_string(),
            work_dir: work_dir.into(),
        }
    }

    /// Name of the attempt-local directory the database writes its
    /// bulk-load logs into.
    pub fn local_log_dir_name(&self) -> String {
        format!("nz-logs-{}", self.task_attempt_id)
    }

    pub fn local_log_dir(&self) -> PathBuf {
        self.work_dir.join(self.local_log_dir_name())
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Bytes moved and time spent by one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferSummary {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferSummary {
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Renders an amount of bytes with a binary unit suffix.
fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024.0 {
        return format!("{} bytes", bytes as u64);
    }
    let mut value = bytes;
    let mut unit = "bytes";
    for u in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = u;
    }
    format!("{:.4} {}", value, unit)
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {:.4} seconds ({}/sec)",
            human_bytes(self.bytes as f64),
            self.elapsed.as_secs_f64(),
            human_bytes(self.bytes_per_sec())
        )
    }
}

/// `TaskResult` is the "Report Card" for one task of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub input: String,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
    pub bytes: u64,
    /// How long the last attempt took (in seconds).
    pub duration: f64,
    /// Either "SUCCESS" or "FAILED".
    pub status: String,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(task_id: String, input: String, attempts: u32, summary: &TransferSummary) -> Self {
        Self {
            task_id,
            input,
            attempts,
            bytes: summary.bytes,
            duration: summary.elapsed.as_secs_f64(),
            status: "SUCCESS".to_string(),
            error: None,
        }
    }

    pub fn failure(task_id: String, input: String, attempts: u32, error: String) -> Self {
        Self {
            task_id,
            input,
            attempts,
            bytes: 0,
            duration: 0.0,
            status: "FAILED".to_string(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}
