//! # Log Upload Port
//!
//! Invoked once per session at teardown to ship the database's bulk-load
//! logs (bad-row files and statement logs) off the task's local disk.

use crate::domain::errors::Result;
use std::path::Path;

pub trait LogUploader: Send + Sync {
    /// Copies the contents of `local_log_dir` under `destination`, grouped
    /// by `job_id`. Failures are reported to the caller, who only logs them.
    fn upload(&self, local_log_dir: &Path, destination: &str, job_id: &str) -> Result<()>;
}
