// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core error definitions for the external table exporter.
//!
//! This module provides a centralized `ExportError` enum and a `Result` type
//! used by every stage of an export session: pipe creation, statement
//! rendering, the database worker and the record loop.

use thiserror::Error;

/// Error types encountered during an export session.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The named pipe could not be created.
    #[error("Could not create FIFO {path}: {reason}")]
    ChannelCreationError { path: String, reason: String },

    /// The bulk-load log directory could not be created or is not writable.
    #[error("Unable to use log directory {path}: {reason}")]
    LogDirectoryError { path: String, reason: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The database client itself is unusable (missing binary, bad driver).
    #[error("Driver error: {0}")]
    DriverError(String),

    /// Captured inside the statement worker and surfaced after join.
    #[error("External table statement failed: {0}")]
    StatementExecutionError(String),

    #[error("Failed writing to FIFO: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("Log upload failed: {0}")]
    LogUploadError(String),

    /// The framework's record source failed to yield the next record.
    #[error("Input error: {0}")]
    InputError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::InputError(e.to_string())
    }
}

/// Every fatal session error reaches the framework as a single I/O failure.
impl From<ExportError> for std::io::Error {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::IoError(inner) => inner,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

/// A specialized Result type for the exporter.
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_becomes_io_error() {
        let err = ExportError::StatementExecutionError("ERROR: bad row".to_string());
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
        assert!(io.to_string().contains("ERROR: bad row"));
    }

    #[test]
    fn test_io_error_round_trips_kind() {
        let err = ExportError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
    }
}
