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

//! # Connection Port
//!
//! The database client contract. The session only ever needs two things from
//! the database: a connection, and a way to run one statement that blocks
//! until the database is done with it.

use crate::domain::errors::Result;

/// An open session with the database.
///
/// `Send` because the connection is handed to the statement worker thread.
pub trait BulkLoadConnection: Send {
    /// Runs `sql` and blocks until the database has finished with it.
    ///
    /// For an external table load this returns only after the writer side
    /// of the pipe has been closed and every byte has been consumed.
    fn execute(&mut self, sql: &str) -> Result<()>;
}

/// Acquires connections. Fails with `ConnectionError` or `DriverError`.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn BulkLoadConnection>>;
}
