//! The export session: one task attempt's worth of records pushed into the
//! database through an external table.
//!
//! The database pulls from a pipe while we push into it, so the two sides
//! must be started in a strict order:
//!
//! 1. create the pipe in the attempt's working directory,
//! 2. render the bulk-load statement against it,
//! 3. acquire a connection,
//! 4. start the statement worker (the database opens the read side),
//! 5. open the write side, which blocks until that reader is attached,
//! 6. stream records, checking the worker's failure flag before each one,
//! 7. close the write side (EOF for the database), join the worker, stop the
//!    clock and upload the database logs,
//! 8. report the worker's error first, then any error of our own.

use crate::application::statement_runner::StatementRunner;
use crate::application::throughput::ThroughputCounter;
use crate::config::BulkLoadConfig;
use crate::domain::delimiters::RecordSerializer;
use crate::domain::entities::{TaskContext, TransferSummary};
use crate::domain::errors::{ExportError, Result};
use crate::infrastructure::netezza::statement::{BulkLoadStatementBuilder, RenderedStatement};
use crate::ports::channel_port::{ChannelProvider, DataChannel};
use crate::ports::connection_port::ConnectionFactory;
use crate::ports::log_upload_port::LogUploader;
use crate::ports::record_source::RecordSource;
use log::{debug, info, warn};
use std::io::Write;

/// File name of the pipe inside the task working directory.
pub const FIFO_FILE_NAME: &str = "nzexttable-export.txt";

/// External collaborators a session talks to.
#[derive(Clone, Copy)]
pub struct SessionPorts<'a> {
    pub connections: &'a dyn ConnectionFactory,
    pub channels: &'a dyn ChannelProvider,
    pub uploader: &'a dyn LogUploader,
}

/// What a successful session did.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub records: u64,
    pub summary: TransferSummary,
    pub statement: RenderedStatement,
}

pub struct ExportSession<'a> {
    ctx: &'a TaskContext,
    table: &'a str,
    config: &'a BulkLoadConfig,
    ports: SessionPorts<'a>,
}

impl<'a> ExportSession<'a> {
    pub fn new(
        ctx: &'a TaskContext,
        table: &'a str,
        config: &'a BulkLoadConfig,
        ports: SessionPorts<'a>,
    ) -> Self {
        Self {
            ctx,
            table,
            config,
            ports,
        }
    }

    /// Runs the whole session, consuming `source` to exhaustion unless the
    /// database fails first.
    pub fn run(&self, source: &mut dyn RecordSource) -> Result<SessionOutcome> {
        let task = self.ctx.task_attempt_id.as_str();
        std::fs::create_dir_all(self.ctx.work_dir())?;
        let work_dir = std::fs::canonicalize(self.ctx.work_dir())?;
        let fifo_path = work_dir.join(FIFO_FILE_NAME);

        let mut channel = self.ports.channels.create(&fifo_path)?;
        info!("[{}] Created FIFO {}", task, fifo_path.display());

        let result = self.run_with_channel(channel.as_mut(), source);
        channel.remove();
        result
    }

    fn run_with_channel(
        &self,
        channel: &mut dyn DataChannel,
        source: &mut dyn RecordSource,
    ) -> Result<SessionOutcome> {
        let task = self.ctx.task_attempt_id.as_str();
        let log_dir = self.ctx.local_log_dir();

        let statement = BulkLoadStatementBuilder::new(self.config).render(
            self.table,
            channel.path(),
            &log_dir,
        )?;

        // A connection that fails part way is dropped (and closed) here.
        let connection = self.ports.connections.connect()?;

        let mut runner = StatementRunner::new(task, connection, statement.sql.clone());
        let mut counter = ThroughputCounter::new();
        runner.start()?;
        counter.start();

        let mut serializer = RecordSerializer::new(
            &self.config.delimiters(),
            self.config.null_value_or_default(),
        );
        let mut records = 0u64;

        // Blocks until the database has opened the pipe for reading, or
        // until the statement has failed without ever opening it.
        let (loop_result, close_result) = match channel.open_for_write(&|| runner.has_failed()) {
            Ok(mut writer) => {
                let loop_result = self.pump(
                    source,
                    writer.as_mut(),
                    &runner,
                    &mut counter,
                    &mut serializer,
                    &mut records,
                );

                // Closing the write side is the end-of-data signal for the database.
                let close_result = writer.flush().map_err(ExportError::WriteError);
                drop(writer);
                if let Err(e) = &close_result {
                    debug!("[{}] Exception closing FIFO writer: {}", task, e);
                }
                (loop_result, close_result)
            }
            Err(e) => {
                warn!("[{}] Could not open FIFO for writing: {}", task, e);
                (Err(ExportError::WriteError(e)), Ok(()))
            }
        };

        runner.join();
        counter.stop();
        let summary = counter.summary();
        info!("[{}] Transferred {}", task, summary);

        self.upload_logs(&log_dir);

        if runner.has_failed() {
            let err = runner.take_error().unwrap_or_else(|| {
                ExportError::StatementExecutionError("statement failed without an error".to_string())
            });
            return Err(err);
        }
        loop_result?;
        close_result?;

        Ok(SessionOutcome {
            records,
            summary,
            statement,
        })
    }

    /// The record loop. Stops at the first record seen after the worker
    /// has failed, or at the first write error.
    fn pump(
        &self,
        source: &mut dyn RecordSource,
        writer: &mut dyn Write,
        runner: &StatementRunner,
        counter: &mut ThroughputCounter,
        serializer: &mut RecordSerializer,
        records: &mut u64,
    ) -> Result<()> {
        while let Some((_key, record)) = source.next_key_value()? {
            if runner.has_failed() {
                warn!(
                    "[{}] External table statement failed; stopping after {} records",
                    self.ctx.task_attempt_id, records
                );
                break;
            }
            let bytes = serializer.serialize(&record)?;
            writer.write_all(&bytes).map_err(ExportError::WriteError)?;
            counter.add_bytes(bytes.len() as u64);
            *records += 1;
        }
        Ok(())
    }

    fn upload_logs(&self, log_dir: &std::path::Path) {
        let Some(destination) = &self.config.log_dir else {
            debug!("[{}] No log destination configured; skipping upload", self.ctx.task_attempt_id);
            return;
        };
        if let Err(e) = self
            .ports
            .uploader
            .upload(log_dir, destination, &self.ctx.job_id)
        {
            warn!("[{}] {}", self.ctx.task_attempt_id, e);
        }
    }
}
