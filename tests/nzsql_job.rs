//! Runs whole jobs through the real FIFO adapter and a stand-in `nzsql`
//! client script that drains the pipe the way the server would.
#![cfg(unix)]

use nz_exttable_exporter::application::job::LocalJob;
use nz_exttable_exporter::application::runtime::RuntimeContext;
use nz_exttable_exporter::config::{AppConfig, CliArgs, InputFormat};
use nz_exttable_exporter::infrastructure::pipe::named_fifo::NamedFifoProvider;
use nz_exttable_exporter::infrastructure::storage::log_uploader::LocalDirUploader;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

/// Copies the external table's pipe into `<out>/<attempt>.out`. Statements
/// against table `REJECTS` drain the pipe and then report a server error;
/// statements against `MISSING` fail without ever opening it.
fn install_client(dir: &Path, out: &Path) -> String {
    let script = format!(
        r#"#!/bin/sh
sql=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-c" ]; then sql="$2"; shift; fi
  shift
done
if [ "$sql" = "SELECT 1" ]; then echo 1; exit 0; fi
pipe=$(printf '%s' "$sql" | sed -n "s/.*EXTERNAL '\([^']*\)'.*/\1/p")
case "$sql" in
  *"INSERT INTO MISSING "*) echo "ERROR:  relation does not exist SALES.ADMIN.MISSING" >&2; exit 1 ;;
esac
attempt=$(basename "$(dirname "$pipe")")
cat "$pipe" > "{out}/$attempt.out"
case "$sql" in
  *"INSERT INTO REJECTS "*) echo "ERROR:  External Table : count of bad input rows reached maxerrors limit" >&2 ;;
esac
exit 0
"#,
        out = out.display()
    );
    let path = dir.join("nzsql");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_str().unwrap().to_string()
}

fn job_config(root: &Path, table: &str, inputs: Vec<String>) -> AppConfig {
    let out = root.join("loaded");
    std::fs::create_dir_all(&out).unwrap();
    let mut config = AppConfig::from_cli(&CliArgs {
        host: Some("nzhost".into()),
        database: Some("SALES".into()),
        username: Some("admin".into()),
        password: Some("secret".into()),
        table: Some(table.into()),
        inputs,
        work_dir: Some(root.join("work").to_str().unwrap().to_string()),
        parallel: Some(2),
        log_dir: Some(root.join("uploaded-logs").to_str().unwrap().to_string()),
        ..Default::default()
    });
    config.database.nzsql_path = Some(install_client(root, &out));
    config
}

fn gzip(path: &Path, contents: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    enc.write_all(contents.as_bytes()).unwrap();
    enc.finish().unwrap();
}

#[test]
fn test_job_loads_every_input_through_nzsql() {
    let root = tempfile::tempdir().unwrap();
    let plain = root.path().join("part-0000.psv");
    let packed = root.path().join("part-0001.psv.gz");
    std::fs::write(&plain, "1|alpha\n2|\n").unwrap();
    gzip(&packed, "3|gamma\n");

    let mut config = job_config(
        root.path(),
        "ORDERS",
        vec![
            plain.to_str().unwrap().into(),
            packed.to_str().unwrap().into(),
        ],
    );
    config.export.input_format = InputFormat::Delimited;
    config.export.input_delimiter = Some(b'|');
    config.validate().unwrap();

    let runtime = RuntimeContext::init(&config);
    let job = LocalJob::new(
        config,
        runtime.connections,
        Arc::new(NamedFifoProvider),
        Arc::new(LocalDirUploader),
    );
    let job_id = job.job_id().to_string();
    let results = job.run().unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()), "{:?}", results);

    let mut loaded: Vec<String> = std::fs::read_dir(root.path().join("loaded"))
        .unwrap()
        .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
        .collect();
    loaded.sort();
    // Empty fields are data, not NULLs.
    assert_eq!(loaded, vec!["1,alpha\n2,\n".to_string(), "3,gamma\n".to_string()]);

    let total: u64 = results.iter().map(|r| r.bytes).sum();
    assert_eq!(total, loaded.iter().map(|s| s.len() as u64).sum::<u64>());
    assert!(root.path().join("uploaded-logs").join(&job_id).is_dir());
}

#[test]
fn test_server_error_fails_the_task() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("part-0000.txt");
    std::fs::write(&input, "a,b\n").unwrap();

    let mut config = job_config(root.path(), "REJECTS", vec![input.to_str().unwrap().into()]);
    config.export.max_attempts = Some(2);

    let runtime = RuntimeContext::init(&config);
    let results = LocalJob::new(
        config,
        runtime.connections,
        Arc::new(NamedFifoProvider),
        Arc::new(LocalDirUploader),
    )
    .run()
    .unwrap();

    assert_eq!(results[0].status, "FAILED");
    assert_eq!(results[0].attempts, 2);
    assert!(results[0].error.as_deref().unwrap().contains("maxerrors"));
    // Each attempt still drained the pipe before the server rejected it.
    assert_eq!(std::fs::read_dir(root.path().join("loaded")).unwrap().count(), 2);
}

#[test]
fn test_unknown_table_fails_without_hanging() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("part-0000.txt");
    std::fs::write(&input, "a,b\n").unwrap();

    let config = job_config(root.path(), "MISSING", vec![input.to_str().unwrap().into()]);
    let runtime = RuntimeContext::init(&config);
    let job = LocalJob::new(
        config,
        runtime.connections,
        Arc::new(NamedFifoProvider),
        Arc::new(LocalDirUploader),
    );

    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(job.run());
    });
    let results = rx
        .recv_timeout(std::time::Duration::from_secs(30))
        .expect("job stayed blocked on the pipe")
        .unwrap();

    assert_eq!(results[0].status, "FAILED");
    assert!(results[0].error.as_deref().unwrap().contains("does not exist"));
    assert_eq!(std::fs::read_dir(root.path().join("loaded")).unwrap().count(), 0);
}
