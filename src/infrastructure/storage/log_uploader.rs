//! Uploads the bulk-load log directory after a session.
//!
//! Two destinations are supported: a plain directory (local disk or a
//! mounted shared filesystem) and Cloud Storage via the `gcloud` CLI.

use crate::domain::errors::{ExportError, Result};
use crate::ports::log_upload_port::LogUploader;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Copies log files into `<destination>/<job_id>/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDirUploader;

impl LogUploader for LocalDirUploader {
    fn upload(&self, local_log_dir: &Path, destination: &str, job_id: &str) -> Result<()> {
        let target = PathBuf::from(destination).join(job_id);
        std::fs::create_dir_all(&target)
            .map_err(|e| ExportError::LogUploadError(format!("{}: {}", target.display(), e)))?;

        let mut copied = 0;
        for entry in std::fs::read_dir(local_log_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let dest = target.join(entry.file_name());
            std::fs::copy(entry.path(), &dest)
                .map_err(|e| ExportError::LogUploadError(format!("{}: {}", dest.display(), e)))?;
            copied += 1;
        }
        info!("Uploaded {} log file(s) to {}", copied, target.display());
        Ok(())
    }
}

/// Uploads with `gcloud storage cp --recursive`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GcsCliUploader;

impl LogUploader for GcsCliUploader {
    fn upload(&self, local_log_dir: &Path, destination: &str, job_id: &str) -> Result<()> {
        let target = format!("{}/{}/", destination.trim_end_matches('/'), job_id);
        info!("Uploading logs to {}", target);

        let output = Command::new("gcloud")
            .arg("storage")
            .arg("cp")
            .arg("--recursive")
            .arg(local_log_dir)
            .arg(&target)
            .output()
            .map_err(|e| ExportError::LogUploadError(format!("could not run gcloud: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::LogUploadError(format!(
                "upload to {} failed: {}",
                target,
                stderr.trim()
            )));
        }
        debug!("gcloud: {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}

/// Picks the uploader matching the destination's scheme.
pub fn uploader_for(destination: &str) -> Box<dyn LogUploader> {
    if destination.starts_with("gs://") {
        Box::new(GcsCliUploader)
    } else {
        Box::new(LocalDirUploader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_upload_groups_by_job() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("ORDERS.nzlog"), b"load ok").unwrap();
        std::fs::write(src.path().join("ORDERS.nzbad"), b"bad,row").unwrap();
        std::fs::create_dir(src.path().join("nested")).unwrap();

        let dest = tempfile::tempdir().unwrap();
        LocalDirUploader
            .upload(src.path(), dest.path().to_str().unwrap(), "job_42")
            .unwrap();

        let job_dir = dest.path().join("job_42");
        assert_eq!(std::fs::read(job_dir.join("ORDERS.nzlog")).unwrap(), b"load ok");
        assert_eq!(std::fs::read(job_dir.join("ORDERS.nzbad")).unwrap(), b"bad,row");
        assert!(!job_dir.join("nested").exists());
    }

    #[test]
    fn test_local_upload_missing_source_fails() {
        let dest = tempfile::tempdir().unwrap();
        let res = LocalDirUploader.upload(
            Path::new("/nonexistent/logs"),
            dest.path().to_str().unwrap(),
            "job_1",
        );
        assert!(res.is_err());
    }
}
