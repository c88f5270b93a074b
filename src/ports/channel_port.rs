//! # Channel Port
//!
//! Contract for the data channel the database reads its bulk-load input
//! from. The production adapter is a named pipe; tests substitute an
//! in-memory double with the same "open blocks until a reader attaches"
//! behaviour.

use crate::domain::errors::Result;
use std::io::Write;
use std::path::Path;

/// A created, not yet opened, data channel.
pub trait DataChannel: Send {
    /// Filesystem path the database is told to read from.
    fn path(&self) -> &Path;

    /// Opens the write side. Blocks until a reader has attached, so the
    /// reader must already have been started.
    ///
    /// `abort` is polled while waiting; once it returns true the open gives
    /// up with `ErrorKind::Interrupted` instead of waiting for a reader that
    /// will never come.
    fn open_for_write(&mut self, abort: &dyn Fn() -> bool) -> std::io::Result<Box<dyn Write + Send>>;

    /// Best-effort removal of the underlying file.
    fn remove(&mut self) {}
}

/// Creates channels. Fails with `ChannelCreationError`.
pub trait ChannelProvider: Send + Sync {
    fn create(&self, path: &Path) -> Result<Box<dyn DataChannel>>;
}
