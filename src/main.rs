//! Command-line entry point: exports local files into a Netezza table.

use clap::Parser;
use log::{error, info, warn};
use nz_exttable_exporter::application::job::LocalJob;
use nz_exttable_exporter::application::runtime::RuntimeContext;
use nz_exttable_exporter::config::{AppConfig, CliArgs};
use nz_exttable_exporter::infrastructure::pipe::named_fifo::NamedFifoProvider;
use nz_exttable_exporter::infrastructure::storage::log_uploader::{uploader_for, LocalDirUploader};
use nz_exttable_exporter::ports::log_upload_port::LogUploader;
use std::process;
use std::sync::Arc;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = if let Some(config_path) = &args.config {
        match AppConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        }
    } else {
        AppConfig::from_cli(&args)
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    // 4. Thread pool and database client
    let runtime = RuntimeContext::init(&config);

    let uploader: Arc<dyn LogUploader> = match config.bulk_load.log_dir.as_deref() {
        Some(dest) => Arc::from(uploader_for(dest)),
        None => Arc::new(LocalDirUploader),
    };

    // 5. Run the job
    let job = LocalJob::new(
        config,
        runtime.connections,
        Arc::new(NamedFifoProvider),
        uploader,
    );

    info!("Starting job {}...", job.job_id());
    match job.run() {
        Ok(results) => {
            let success_count = results.iter().filter(|r| r.is_success()).count();
            info!(
                "Export finished. {}/{} tasks successful.",
                success_count,
                results.len()
            );
            if success_count < results.len() {
                for r in results.iter().filter(|r| !r.is_success()) {
                    warn!("{} ({}): {}", r.task_id, r.input, r.error.as_deref().unwrap_or(""));
                }
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Job failed: {:?}", e);
            process::exit(1);
        }
    }
}
