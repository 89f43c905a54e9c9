//! Shipping finished output files to a remote destination.

use crate::{Result, ScoutError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Raw title -> link mappings
    Json,
    /// Enriched tables
    Csv,
}

impl UploadKind {
    /// Key prefix under the destination.
    pub fn prefix(&self) -> &'static str {
        match self {
            UploadKind::Json => "raw",
            UploadKind::Csv => "processed",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            UploadKind::Json => "json",
            UploadKind::Csv => "csv",
        }
    }
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `files`, returning how many made it. A file that fails is
    /// logged and skipped.
    async fn upload(&self, files: &[PathBuf], kind: UploadKind) -> Result<usize>;
}

/// Lists the files of `kind` sitting in `dir`, sorted by name.
pub fn collect_files(dir: &Path, kind: UploadKind) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(kind.extension())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Mirrors files into a directory (a mounted bucket, a network share, ...)
/// under `raw/` or `processed/`.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    destination: PathBuf,
}

impl DirectoryUploader {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl Uploader for DirectoryUploader {
    async fn upload(&self, files: &[PathBuf], kind: UploadKind) -> Result<usize> {
        let target_dir = self.destination.join(kind.prefix());
        tokio::fs::create_dir_all(&target_dir).await.map_err(|e| {
            ScoutError::Upload(format!("cannot create {}: {}", target_dir.display(), e))
        })?;

        let mut uploaded = 0;
        for file in files {
            let Some(name) = file.file_name() else {
                warn!("Skipping upload of {}: no file name", file.display());
                continue;
            };

            match tokio::fs::copy(file, target_dir.join(name)).await {
                Ok(_) => uploaded += 1,
                Err(e) => warn!("Failed to upload {}: {}", file.display(), e),
            }
        }

        info!(
            "Uploaded {}/{} {} files to {}",
            uploaded,
            files.len(),
            kind.extension(),
            target_dir.display()
        );
        Ok(uploaded)
    }
}
