//! Named pipe (POSIX FIFO) used as the external table data source.
//!
//! The FIFO is created with the `mkfifo` utility, the same way the rest of
//! the crate shells out to platform tools. Opening the write side blocks in
//! the kernel until the database has opened the read side, and writes block
//! whenever the database lags, which throttles the record loop for free.

use crate::domain::errors::{ExportError, Result};
use crate::ports::channel_port::{ChannelProvider, DataChannel};
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, error};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const WRITE_BUFFER_BYTES: usize = 128 * 1024;
const OPEN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One named pipe on local disk.
#[derive(Debug)]
pub struct NamedFifo {
    path: PathBuf,
    created: bool,
}

impl NamedFifo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            created: false,
        }
    }

    /// Creates the FIFO with mode 0600.
    ///
    /// An existing FIFO at the path is reused; any other existing file is
    /// an error.
    #[cfg(unix)]
    pub fn create(&mut self) -> Result<()> {
        use std::os::unix::fs::FileTypeExt;

        let fail = |reason: String| ExportError::ChannelCreationError {
            path: self.path.display().to_string(),
            reason,
        };

        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_fifo() => {
                debug!("Reusing existing FIFO {}", self.path.display());
                self.created = true;
                return Ok(());
            }
            Ok(_) => return Err(fail("path exists and is not a FIFO".to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(fail(e.to_string())),
        }

        let output = Command::new("mkfifo")
            .arg("-m")
            .arg("0600")
            .arg(&self.path)
            .output()
            .map_err(|e| fail(format!("could not run mkfifo: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Could not create FIFO file {}", self.path.display());
            return Err(fail(stderr.trim().to_string()));
        }

        self.created = true;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn create(&mut self) -> Result<()> {
        Err(ExportError::ChannelCreationError {
            path: self.path.display().to_string(),
            reason: "named pipes are not supported on this platform".to_string(),
        })
    }
}

impl DataChannel for NamedFifo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_write(&mut self, abort: &dyn Fn() -> bool) -> std::io::Result<Box<dyn Write + Send>> {
        if !self.created {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("FIFO {} has not been created", self.path.display()),
            ));
        }

        // The kernel open cannot be cancelled, so it runs on a helper thread
        // while this one watches `abort`.
        let (tx, rx) = bounded(1);
        let path = self.path.clone();
        std::thread::Builder::new()
            .name("nz-fifo-open".to_string())
            .spawn(move || {
                let _ = tx.send(OpenOptions::new().write(true).open(&path));
            })?;

        loop {
            match rx.recv_timeout(OPEN_POLL_INTERVAL) {
                Ok(file) => {
                    return Ok(Box::new(BufWriter::with_capacity(WRITE_BUFFER_BYTES, file?)));
                }
                Err(RecvTimeoutError::Timeout) if abort() => {
                    // Attach a reader of our own so the pending open returns,
                    // then let both ends go.
                    let reader = OpenOptions::new().read(true).open(&self.path);
                    let _ = rx.recv();
                    drop(reader);
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Interrupted,
                        format!("gave up opening {}: no reader will attach", self.path.display()),
                    ));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "FIFO open thread exited without a result",
                    ));
                }
            }
        }
    }

    fn remove(&mut self) {
        if self.created {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!("Could not remove FIFO {}: {}", self.path.display(), e);
            }
            self.created = false;
        }
    }
}

/// Creates `NamedFifo` channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamedFifoProvider;

impl ChannelProvider for NamedFifoProvider {
    fn create(&self, path: &Path) -> Result<Box<dyn DataChannel>> {
        let mut fifo = NamedFifo::new(path);
        fifo.create()?;
        Ok(Box::new(fifo))
    }
}
