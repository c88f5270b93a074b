//! Renders the Netezza external table `INSERT ... SELECT * FROM EXTERNAL`
//! statement that loads a table from the session's pipe.
//!
//! The rendering itself is pure. The one side effect is preparing the log
//! directory the database writes its `.nzlog`/`.nzbad` files into, which has
//! to exist and be writable before the statement can reference it.

use crate::config::BulkLoadConfig;
use crate::domain::errors::{ExportError, Result};
use log::{debug, warn};
use std::path::Path;

/// Value of the `QUOTEDVALUE` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotedValue {
    Single,
    Double,
}

impl QuotedValue {
    /// Only `'` and `"` can be expressed; anything else has no clause.
    pub fn from_char(c: u8) -> Option<Self> {
        match c {
            b'\'' => Some(QuotedValue::Single),
            b'"' => Some(QuotedValue::Double),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            QuotedValue::Single => "SINGLE",
            QuotedValue::Double => "DOUBLE",
        }
    }
}

/// A rendered statement plus any options that had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub warnings: Vec<String>,
}

/// Builds bulk-load statements from an immutable `BulkLoadConfig`.
pub struct BulkLoadStatementBuilder<'a> {
    config: &'a BulkLoadConfig,
}

impl<'a> BulkLoadStatementBuilder<'a> {
    pub fn new(config: &'a BulkLoadConfig) -> Self {
        Self { config }
    }

    /// Renders the statement loading `table` from the pipe at `pipe_path`.
    ///
    /// `log_dir` is created if missing and must be a writable directory,
    /// otherwise `LogDirectoryError` is returned and nothing is rendered.
    pub fn render(&self, table: &str, pipe_path: &Path, log_dir: &Path) -> Result<RenderedStatement> {
        let log_dir = prepare_log_dir(log_dir)?;
        let cfg = self.config;
        let delimiters = cfg.delimiters();
        let mut warnings = Vec::new();

        let mut options: Vec<String> = Vec::with_capacity(16);
        if let Some(source) = &cfg.remote_source {
            options.push(format!("REMOTESOURCE '{}'", source));
        }
        options.push("BOOLSTYLE 'TRUE_FALSE'".to_string());
        // CRINSTRING is always stated; the others only when switched on.
        options.push(format!("CRINSTRING {}", bool_sql(cfg.crin_string)));
        if cfg.ctrl_chars {
            options.push("CTRLCHARS TRUE".to_string());
        }
        if cfg.trunc_string {
            options.push("TRUNCSTRING TRUE".to_string());
        }
        if cfg.ignore_zero {
            options.push("IGNOREZERO TRUE".to_string());
        }
        options.push(format!("DELIMITER {}", delimiters.fields_terminated_by as u32));
        options.push("ENCODING 'internal'".to_string());
        if delimiters.escaped_by.is_some() {
            // Always backslash, whatever was configured.
            options.push("ESCAPECHAR '\\'".to_string());
        }
        options.push("FORMAT 'Text'".to_string());
        options.push("INCLUDEZEROSECONDS TRUE".to_string());
        options.push(format!("NULLVALUE '{}'", cfg.null_value_or_default()));
        if let Some(qc) = delimiters.enclosed_by {
            match QuotedValue::from_char(qc) {
                Some(q) => options.push(format!("QUOTEDVALUE {}", q.as_sql())),
                None => {
                    let msg = format!(
                        "Unsupported enclosed by character: {} - ignoring.",
                        char::from(qc)
                    );
                    warn!("{}", msg);
                    warnings.push(msg);
                }
            }
        }
        options.push(format!("MAXERRORS {}", cfg.error_threshold));
        options.push(format!("LOGDIR {}", log_dir.display()));

        let sql = format!(
            "INSERT INTO {} SELECT * FROM EXTERNAL '{}' USING ( {} )",
            table,
            pipe_path.display(),
            options.join(" ")
        );
        debug!("SQL generated for external table export: {}", sql);

        Ok(RenderedStatement { sql, warnings })
    }
}

fn bool_sql(v: bool) -> &'static str {
    if v {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Creates `dir` and proves it is writable. Returns its absolute path.
fn prepare_log_dir(dir: &Path) -> Result<std::path::PathBuf> {
    let fail = |reason: String| ExportError::LogDirectoryError {
        path: dir.display().to_string(),
        reason,
    };

    std::fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
    if !dir.is_dir() {
        return Err(fail("not a directory".to_string()));
    }
    tempfile::tempfile_in(dir).map_err(|e| fail(format!("not writable: {}", e)))?;

    std::fs::canonicalize(dir).map_err(|e| fail(e.to_string()))
}
