//! Per-request upload staging.
//!
//! Every request gets its own uniquely named directory under the configured
//! upload root. Parts are streamed to disk as they arrive and read back
//! (and deleted) one at a time. `close` removes the directory on the blocking
//! pool; dropping `StagingArea` on an early return removes it inline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::extract::multipart::Field;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::models::UploadedFile;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct StagingArea {
    dir: TempDir,
}

/// A multipart part written to the staging directory, not yet read back.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    pub declared_type: String,
    pub original_name: String,
}

impl StagingArea {
    pub async fn create(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create upload root {}", root.display()))?;

        let dir = tempfile::Builder::new()
            .prefix("intake-")
            .tempdir_in(root)
            .with_context(|| format!("Failed to create staging dir under {}", root.display()))?;

        debug!("Staging uploads in {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the staging directory without blocking an async worker.
    pub async fn close(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => debug!("Removed staging dir {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove staging dir {}: {e}", path.display()),
            Err(e) => warn!("Staging cleanup task for {} failed: {e}", path.display()),
        }
    }

    /// Streams one multipart file part to disk.
    pub async fn stage_field(&self, mut field: Field<'_>) -> Result<StagedFile, AppError> {
        let declared_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let original_name = field.file_name().unwrap_or("unknown").to_string();

        // The client-supplied name never reaches the filesystem.
        let path = self.path().join(Uuid::new_v4().to_string());
        let mut out = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        while let Some(chunk) = field.chunk().await? {
            out.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        out.flush().await.context("Failed to flush staged upload")?;

        Ok(StagedFile {
            path,
            declared_type,
            original_name,
        })
    }
}

impl StagedFile {
    /// Reads the staged bytes back into memory and deletes the staged copy,
    /// whether or not the read succeeded.
    pub async fn load(self) -> Result<UploadedFile> {
        let read = tokio::fs::read(&self.path).await;

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Failed to remove staged upload {}: {e}", self.path.display());
        }

        let content = read.with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(UploadedFile::new(
            content,
            self.declared_type,
            self.original_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn entries(dir: &Path) -> usize {
        let mut read = tokio::fs::read_dir(dir).await.unwrap();
        let mut n = 0;
        while read.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn test_staging_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).await.unwrap();
        tokio::fs::write(staging.path().join("leftover"), b"x")
            .await
            .unwrap();
        assert_eq!(entries(root.path()).await, 1);

        drop(staging);

        assert_eq!(entries(root.path()).await, 0);
    }

    #[tokio::test]
    async fn test_close_removes_dir_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).await.unwrap();
        tokio::fs::write(staging.path().join("leftover"), b"x")
            .await
            .unwrap();

        staging.close().await;

        assert_eq!(entries(root.path()).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingArea::create(root.path()).await.unwrap();
        let b = StagingArea::create(root.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_create_makes_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("uploads").join("nested");
        let staging = StagingArea::create(&nested).await.unwrap();
        assert!(staging.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn test_load_deletes_staged_copy() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path()).await.unwrap();
        let path = staging.path().join("part");
        tokio::fs::write(&path, b"Hello world").await.unwrap();

        let staged = StagedFile {
            path: path.clone(),
            declared_type: "text/plain".to_string(),
            original_name: "hello.txt".to_string(),
        };
        let file = staged.load().await.unwrap();

        assert_eq!(&file.content[..], b"Hello world");
        assert_eq!(file.original_name, "hello.txt");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let root = tempfile::tempdir().unwrap();
        let staged = StagedFile {
            path: root.path().join("gone"),
            declared_type: "text/plain".to_string(),
            original_name: "gone.txt".to_string(),
        };
        assert!(staged.load().await.is_err());
    }
}
