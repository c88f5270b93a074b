use crate::domain::delimiters::DelimiterSet;
use crate::domain::errors::{ExportError, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub bulk_load: BulkLoadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    /// Path to the `nzsql` client. Looked up on `PATH` when unset.
    pub nzsql_path: Option<String>,
}

fn default_port() -> u16 {
    5480
}

/// How input files are turned into records.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Every line is one already-delimited record.
    #[default]
    Text,
    /// Lines are split on `input_delimiter` and re-rendered with the
    /// bulk-load delimiters.
    Delimited,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// Target table of the `INSERT INTO ... SELECT * FROM EXTERNAL`.
    pub table: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub input_format: InputFormat,
    pub input_delimiter: Option<u8>,
    pub work_dir: Option<String>,
    pub report_dir: Option<String>,
    pub parallel: Option<usize>,
    pub cpu_percent: Option<u8>,
    pub max_attempts: Option<u32>,
}

/// Options rendered into the `USING (...)` clause of the bulk-load statement.
///
/// Built once per session; never mutated afterwards. Delimiter, enclosing
/// and escape characters are single-byte ASCII codes (1-127, 0 for unset).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BulkLoadConfig {
    /// Token the database treats as NULL. `null` when unset.
    pub null_value: Option<String>,
    /// Rows the database may reject before failing the statement.
    pub error_threshold: u32,
    pub ctrl_chars: bool,
    pub trunc_string: bool,
    pub ignore_zero: bool,
    pub crin_string: bool,
    /// Destination the bulk-load logs are uploaded to after the session.
    pub log_dir: Option<String>,
    /// Emitted as `REMOTESOURCE '<value>'` when set.
    pub remote_source: Option<String>,
    pub field_delimiter: u8,
    pub enclosed_by: u8,
    pub escaped_by: u8,
}

impl Default for BulkLoadConfig {
    fn default() -> Self {
        Self {
            null_value: None,
            error_threshold: 1,
            ctrl_chars: false,
            trunc_string: false,
            ignore_zero: false,
            crin_string: false,
            log_dir: None,
            remote_source: None,
            field_delimiter: b',',
            enclosed_by: 0,
            escaped_by: 0,
        }
    }
}

impl BulkLoadConfig {
    pub fn delimiters(&self) -> DelimiterSet {
        DelimiterSet::new(self.field_delimiter, self.enclosed_by, self.escaped_by)
    }

    pub fn null_value_or_default(&self) -> &str {
        self.null_value.as_deref().unwrap_or("null")
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    // Overrides for ad-hoc runs
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub database: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub table: Option<String>,
    /// Input file; repeat for several tasks
    #[arg(short, long = "input")]
    pub inputs: Vec<String>,
    #[arg(long)]
    pub work_dir: Option<String>,
    #[arg(long)]
    pub parallel: Option<usize>,
    /// Where bulk-load logs are uploaded (local path or gs:// URI)
    #[arg(long)]
    pub log_dir: Option<String>,
    #[arg(long)]
    pub error_threshold: Option<u32>,
    #[arg(long)]
    pub null_value: Option<String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents).map_err(|e| ExportError::ConfigError(e.to_string()))?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ExportError::ConfigError(e.to_string()))?
        };

        Ok(config)
    }

    /// Builds a config purely from CLI flags, for runs without a file.
    pub fn from_cli(args: &CliArgs) -> Self {
        Self {
            database: DatabaseConfig {
                host: args.host.clone().unwrap_or_default(),
                port: default_port(),
                database: args.database.clone().unwrap_or_default(),
                username: args.username.clone().unwrap_or_default(),
                password: args.password.clone(),
                nzsql_path: None,
            },
            export: ExportConfig {
                table: args.table.clone().unwrap_or_default(),
                inputs: args.inputs.clone(),
                input_format: InputFormat::Text,
                input_delimiter: None,
                work_dir: args.work_dir.clone(),
                report_dir: None,
                parallel: args.parallel,
                cpu_percent: None,
                max_attempts: None,
            },
            bulk_load: BulkLoadConfig::default(),
        }
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(h) = &args.host { self.database.host = h.clone(); }
        if let Some(d) = &args.database { self.database.database = d.clone(); }
        if let Some(u) = &args.username { self.database.username = u.clone(); }
        if let Some(p) = &args.password { self.database.password = Some(p.clone()); }
        if let Some(t) = &args.table { self.export.table = t.clone(); }
        if !args.inputs.is_empty() { self.export.inputs = args.inputs.clone(); }
        if let Some(w) = &args.work_dir { self.export.work_dir = Some(w.clone()); }
        if let Some(p) = args.parallel { self.export.parallel = Some(p); }
        if let Some(l) = &args.log_dir { self.bulk_load.log_dir = Some(l.clone()); }
        if let Some(e) = args.error_threshold { self.bulk_load.error_threshold = e; }
        if let Some(n) = &args.null_value { self.bulk_load.null_value = Some(n.clone()); }
    }

    pub fn validate(&self) -> Result<()> {
        if self.export.table.trim().is_empty() {
            return Err(ExportError::ConfigError("export.table must be set".into()));
        }
        if self.export.inputs.is_empty() {
            return Err(ExportError::ConfigError("at least one input is required".into()));
        }
        if self.bulk_load.field_delimiter == 0 {
            return Err(ExportError::ConfigError("bulk_load.field_delimiter must be non-zero".into()));
        }
        for (name, code) in [
            ("bulk_load.field_delimiter", self.bulk_load.field_delimiter),
            ("bulk_load.enclosed_by", self.bulk_load.enclosed_by),
            ("bulk_load.escaped_by", self.bulk_load.escaped_by),
            ("export.input_delimiter", self.export.input_delimiter.unwrap_or(b',')),
        ] {
            if !code.is_ascii() {
                return Err(ExportError::ConfigError(format!(
                    "{} must be an ASCII character code, got {}",
                    name, code
                )));
            }
        }
        if self.export.max_attempts == Some(0) {
            return Err(ExportError::ConfigError("export.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn work_dir(&self) -> &str {
        self.export.work_dir.as_deref().unwrap_or("./nz-work")
    }

    /// Password from the config file, falling back to `NZ_PASSWORD`.
    pub fn password(&self) -> Option<String> {
        self.database
            .password
            .clone()
            .or_else(|| std::env::var("NZ_PASSWORD").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
database:
  host: "nzhost"
  database: "SALES"
  username: "admin"
export:
  table: "ORDERS"
  inputs: ["part-0000.txt", "part-0001.txt.gz"]
  input_format: delimited
  input_delimiter: 9
bulk_load:
  error_threshold: 10
  ctrl_chars: true
  field_delimiter: 124
  enclosed_by: 34
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        let path = file.path().to_str().unwrap();

        let config = AppConfig::from_file(path).expect("Failed to parse config");

        assert_eq!(config.database.port, 5480);
        assert_eq!(config.export.inputs.len(), 2);
        assert_eq!(config.export.input_format, InputFormat::Delimited);
        assert_eq!(config.bulk_load.error_threshold, 10);
        assert!(config.bulk_load.ctrl_chars);
        assert!(!config.bulk_load.trunc_string);
        assert_eq!(config.bulk_load.delimiters().fields_terminated_by, b'|');
        assert_eq!(config.bulk_load.delimiters().enclosed_by, Some(b'"'));
        assert_eq!(config.bulk_load.null_value_or_default(), "null");
        config.validate().unwrap();
    }

    #[test]
    fn test_bulk_load_defaults() {
        let cfg = BulkLoadConfig::default();
        assert_eq!(cfg.error_threshold, 1);
        assert!(!cfg.ctrl_chars && !cfg.trunc_string && !cfg.ignore_zero && !cfg.crin_string);
        assert_eq!(cfg.field_delimiter, b',');
        assert_eq!(cfg.delimiters().enclosed_by, None);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = AppConfig::from_cli(&CliArgs {
            table: Some("T1".into()),
            inputs: vec!["a.txt".into()],
            ..Default::default()
        });
        let args = CliArgs {
            table: Some("T2".into()),
            error_threshold: Some(5),
            null_value: Some("\\N".into()),
            log_dir: Some("/var/log/nz".into()),
            ..Default::default()
        };
        config.merge_cli(&args);

        assert_eq!(config.export.table, "T2");
        assert_eq!(config.export.inputs, vec!["a.txt".to_string()]);
        assert_eq!(config.bulk_load.error_threshold, 5);
        assert_eq!(config.bulk_load.null_value_or_default(), "\\N");
        assert_eq!(config.bulk_load.log_dir.as_deref(), Some("/var/log/nz"));
    }

    #[test]
    fn test_validate_rejects_non_ascii_codes() {
        let mut config = AppConfig::from_cli(&CliArgs {
            table: Some("T".into()),
            inputs: vec!["a.txt".into()],
            ..Default::default()
        });
        config.validate().unwrap();

        config.bulk_load.field_delimiter = 0xA7;
        match config.validate() {
            Err(ExportError::ConfigError(m)) => assert!(m.contains("field_delimiter")),
            other => panic!("unexpected {:?}", other),
        }

        config.bulk_load.field_delimiter = b'|';
        config.bulk_load.escaped_by = 200;
        assert!(matches!(config.validate(), Err(ExportError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_missing_table_and_inputs() {
        let config = AppConfig::from_cli(&CliArgs::default());
        assert!(matches!(config.validate(), Err(ExportError::ConfigError(_))));

        let config = AppConfig::from_cli(&CliArgs {
            table: Some("T".into()),
            ..Default::default()
        });
        assert!(matches!(config.validate(), Err(ExportError::ConfigError(_))));
    }
}
