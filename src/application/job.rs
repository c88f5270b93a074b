//! A single-host job runner.
//!
//! Plays the part of the processing framework for local runs: every input
//! file becomes one task, tasks run in parallel on the rayon pool, each task
//! attempt gets its own working directory, and failed attempts are retried
//! up to `max_attempts`. Retries live here, never inside a session.

use crate::application::export_session::{ExportSession, SessionPorts};
use crate::config::AppConfig;
use crate::domain::entities::{TaskContext, TaskResult, TransferSummary};
use crate::domain::errors::{ExportError, Result};
use crate::infrastructure::local::file_source::FileRecordSource;
use crate::ports::channel_port::ChannelProvider;
use crate::ports::connection_port::ConnectionFactory;
use crate::ports::log_upload_port::LogUploader;
use log::{error, info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub struct LocalJob {
    config: AppConfig,
    job_id: String,
    connections: Arc<dyn ConnectionFactory>,
    channels: Arc<dyn ChannelProvider>,
    uploader: Arc<dyn LogUploader>,
}

impl LocalJob {
    pub fn new(
        config: AppConfig,
        connections: Arc<dyn ConnectionFactory>,
        channels: Arc<dyn ChannelProvider>,
        uploader: Arc<dyn LogUploader>,
    ) -> Self {
        let job_id = format!("job_{}", chrono::Local::now().format("%Y%m%d%H%M%S"));
        Self {
            config,
            job_id,
            connections,
            channels,
            uploader,
        }
    }

    pub fn with_job_id(mut self, job_id: &str) -> Self {
        self.job_id = job_id.to_string();
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    fn attempt_id(&self, task: usize, attempt: u32) -> String {
        format!(
            "attempt_{}_m_{:06}_{}",
            self.job_id.trim_start_matches("job_"),
            task,
            attempt
        )
    }

    /// Runs every task and writes the job report.
    pub fn run(&self) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        info!(
            "Starting job {} with {} task(s) into {}",
            self.job_id,
            self.config.export.inputs.len(),
            self.config.export.table
        );

        let results: Vec<TaskResult> = self
            .config
            .export
            .inputs
            .par_iter()
            .enumerate()
            .map(|(i, input)| self.run_task(i, input))
            .collect();

        self.generate_report(&results, start_time.elapsed().as_secs_f64())?;
        Ok(results)
    }

    fn run_task(&self, task: usize, input: &str) -> TaskResult {
        let max_attempts = self.config.export.max_attempts.unwrap_or(1);
        let task_id = format!("task_{}_m_{:06}", self.job_id.trim_start_matches("job_"), task);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            let attempt_id = self.attempt_id(task, attempt);
            let work_dir = Path::new(self.config.work_dir()).join(&attempt_id);
            let ctx = TaskContext::new(&self.job_id, &attempt_id, work_dir);

            match self.run_attempt(&ctx, input) {
                Ok(summary) => {
                    info!("[{}] Export of {} finished", attempt_id, input);
                    return TaskResult::success(task_id, input.to_string(), attempt + 1, &summary);
                }
                Err(e) => {
                    error!("[{}] Attempt failed: {}", attempt_id, e);
                    last_error = e.to_string();
                }
            }
            // The attempt directory goes with the attempt.
            if let Err(e) = std::fs::remove_dir_all(ctx.work_dir()) {
                warn!("[{}] Could not clean {}: {}", attempt_id, ctx.work_dir().display(), e);
            }
        }

        TaskResult::failure(task_id, input.to_string(), max_attempts, last_error)
    }

    fn run_attempt(
        &self,
        ctx: &TaskContext,
        input: &str,
    ) -> Result<TransferSummary> {
        let export = &self.config.export;
        let delimiter = export.input_delimiter.unwrap_or(b',');
        let mut source = FileRecordSource::open(Path::new(input), export.input_format, delimiter)?;

        let ports = SessionPorts {
            connections: self.connections.as_ref(),
            channels: self.channels.as_ref(),
            uploader: self.uploader.as_ref(),
        };
        let session = ExportSession::new(ctx, &export.table, &self.config.bulk_load, ports);
        Ok(session.run(&mut source)?.summary)
    }

    fn generate_report(&self, results: &[TaskResult], duration_secs: f64) -> Result<PathBuf> {
        let success = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - success;
        let total_bytes: u64 = results.iter().map(|r| r.bytes).sum();

        let report = json!({
            "summary": {
                "job_id": self.job_id,
                "table": self.config.export.table,
                "total_tasks": results.len(),
                "success": success,
                "failed": failed,
                "total_bytes": total_bytes,
                "total_duration_seconds": duration_secs,
                "total_mb_per_sec": if duration_secs > 0.0 { (total_bytes as f64 / 1024.0 / 1024.0) / duration_secs } else { 0.0 }
            },
            "details": results
        });

        let report_dir = self
            .config
            .export
            .report_dir
            .as_deref()
            .unwrap_or(self.config.work_dir());
        std::fs::create_dir_all(report_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let report_path = Path::new(report_dir).join(format!("report_{}.json", timestamp));
        let file = std::fs::File::create(&report_path)?;
        serde_json::to_writer_pretty(file, &report)
            .map_err(|e| ExportError::IoError(e.into()))?;

        info!("Report written to {}", report_path.display());
        Ok(report_path)
    }
}
