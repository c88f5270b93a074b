//! Background worker that runs the blocking bulk-load statement.
//!
//! The worker owns the database connection for the lifetime of the
//! statement. It never lets an error (or a panic) escape the thread: the
//! outcome travels back through the `JoinHandle`, and a shared
//! `FailureState` flag lets the record loop notice a failure while the
//! statement is still in flight.

use crate::domain::errors::{ExportError, Result};
use crate::ports::connection_port::BulkLoadConnection;
use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Failure flag shared between the worker (single writer) and the session.
///
/// Once raised it is never cleared.
#[derive(Debug, Default)]
pub struct FailureState {
    failed: AtomicBool,
}

impl FailureState {
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Runs one statement on one connection on a dedicated thread.
pub struct StatementRunner {
    task_id: String,
    sql: String,
    connection: Option<Box<dyn BulkLoadConnection>>,
    failure: Arc<FailureState>,
    handle: Option<JoinHandle<Result<()>>>,
    error: Option<ExportError>,
    state: RunnerState,
}

impl StatementRunner {
    pub fn new(task_id: &str, connection: Box<dyn BulkLoadConnection>, sql: String) -> Self {
        Self {
            task_id: task_id.to_string(),
            sql,
            connection: Some(connection),
            failure: Arc::new(FailureState::default()),
            handle: None,
            error: None,
            state: RunnerState::Idle,
        }
    }

    /// Spawns the worker. Only valid once, from `Idle`.
    pub fn start(&mut self) -> Result<()> {
        let mut connection = self.connection.take().ok_or_else(|| {
            ExportError::StatementExecutionError(format!("runner for {} already started", self.task_id))
        })?;
        let sql = self.sql.clone();
        let failure = Arc::clone(&self.failure);
        let task_id = self.task_id.clone();

        let handle = std::thread::Builder::new()
            .name(format!("nz-exttable-{}", self.task_id))
            .spawn(move || {
                debug!("[{}] External table statement started", task_id);
                let outcome = connection.execute(&sql);
                if let Err(e) = &outcome {
                    error!("[{}] External table statement failed: {}", task_id, e);
                    failure.mark_failed();
                }
                // The connection is released only after the outcome is recorded.
                drop(connection);
                outcome
            })?;

        self.handle = Some(handle);
        self.state = RunnerState::Running;
        Ok(())
    }

    /// Polled by the record loop before every record.
    pub fn has_failed(&self) -> bool {
        self.failure.has_failed() || self.error.is_some()
    }

    pub fn state(&self) -> RunnerState {
        if self.state == RunnerState::Running && self.failure.has_failed() {
            return RunnerState::Failed;
        }
        self.state
    }

    /// Blocks until the worker reaches a terminal state.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(())) => self.state = RunnerState::Completed,
            Ok(Err(e)) => {
                self.record_error(e);
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.failure.mark_failed();
                self.record_error(ExportError::StatementExecutionError(format!(
                    "statement worker panicked: {}",
                    msg
                )));
            }
        }
    }

    /// First failure wins; later ones are only logged.
    fn record_error(&mut self, e: ExportError) {
        self.state = RunnerState::Failed;
        if self.error.is_none() {
            self.error = Some(e);
        } else {
            debug!("[{}] Ignoring subsequent runner error: {}", self.task_id, e);
        }
    }

    /// The captured failure, if any. Available after `join()`.
    pub fn take_error(&mut self) -> Option<ExportError> {
        self.error.take()
    }
}
