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

//! Database client adapter backed by the `nzsql` command-line client.
//!
//! Each `execute` runs one `nzsql -c` invocation and blocks until the client
//! exits, which for an external table load is after the pipe hits EOF.

use crate::config::DatabaseConfig;
use crate::domain::errors::{ExportError, Result};
use crate::ports::connection_port::{BulkLoadConnection, ConnectionFactory};
use log::{debug, info};
use std::process::{Command, Output};

/// Connection parameters for one `nzsql` invocation.
#[derive(Debug, Clone)]
pub struct NzsqlSettings {
    pub program: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

impl NzsqlSettings {
    pub fn from_config(db: &DatabaseConfig, password: Option<String>) -> Self {
        Self {
            program: db.nzsql_path.clone().unwrap_or_else(|| "nzsql".to_string()),
            host: db.host.clone(),
            port: db.port,
            database: db.database.clone(),
            username: db.username.clone(),
            password,
        }
    }

    fn command(&self, sql: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-host")
            .arg(&self.host)
            .arg("-port")
            .arg(self.port.to_string())
            .arg("-d")
            .arg(&self.database)
            .arg("-u")
            .arg(&self.username)
            // Unaligned, tuples only: keeps stdout parseable and quiet.
            .arg("-A")
            .arg("-t")
            .arg("-c")
            .arg(sql);
        if let Some(pw) = &self.password {
            cmd.env("NZ_PASSWORD", pw);
        }
        cmd
    }

    fn run(&self, sql: &str) -> std::io::Result<Output> {
        self.command(sql).output()
    }
}

/// `nzsql` prints server errors as `ERROR:  ...` and may still exit 0.
fn client_error(output: &Output) -> Option<String> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() || stderr.lines().any(|l| l.trim_start().starts_with("ERROR:")) {
        let msg = stderr.trim();
        if msg.is_empty() {
            return Some(format!("nzsql exited with {}", output.status));
        }
        return Some(msg.to_string());
    }
    None
}

/// A verified set of connection parameters.
pub struct NzsqlConnection {
    settings: NzsqlSettings,
}

impl BulkLoadConnection for NzsqlConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing via {}: {}", self.settings.program, sql);
        let output = self
            .settings
            .run(sql)
            .map_err(|e| ExportError::DriverError(format!("Failed to run {}: {}", self.settings.program, e)))?;
        match client_error(&output) {
            Some(msg) => Err(ExportError::StatementExecutionError(msg)),
            None => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if !stdout.trim().is_empty() {
                    info!("nzsql: {}", stdout.trim());
                }
                Ok(())
            }
        }
    }
}

/// Hands out `nzsql` connections after probing the server with `SELECT 1`.
pub struct NzsqlConnectionFactory {
    settings: NzsqlSettings,
}

impl NzsqlConnectionFactory {
    pub fn new(settings: NzsqlSettings) -> Self {
        Self { settings }
    }
}

impl ConnectionFactory for NzsqlConnectionFactory {
    fn connect(&self) -> Result<Box<dyn BulkLoadConnection>> {
        let output = self.settings.run("SELECT 1").map_err(|e| {
            ExportError::DriverError(format!("Failed to run {}: {}", self.settings.program, e))
        })?;
        if let Some(msg) = client_error(&output) {
            return Err(ExportError::ConnectionError(format!(
                "{}@{}:{}/{}: {}",
                self.settings.username, self.settings.host, self.settings.port, self.settings.database, msg
            )));
        }
        Ok(Box::new(NzsqlConnection {
            settings: self.settings.clone(),
        }))
    }
}
