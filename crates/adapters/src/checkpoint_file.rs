//! JSON file checkpoint store.

use code_ingest_ports::{BoxFuture, Checkpoint, CheckpointStore};
use code_ingest_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores the single checkpoint as pretty JSON at a fixed path.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store backed by `path`; parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, operation: &'static str, error: &std::io::Error) -> ErrorEnvelope {
        ErrorEnvelope::unexpected(
            ErrorCode::io(),
            format!("checkpoint {operation} failed: {error}"),
            ErrorClass::NonRetriable,
        )
        .with_metadata("path", self.path.display().to_string())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<Checkpoint>>> {
        Box::pin(async move {
            let bytes = match tokio::fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
                Err(error) => return Err(self.io_error("read", &error)),
            };
            let checkpoint = serde_json::from_slice(&bytes).map_err(|error| {
                ErrorEnvelope::expected(
                    ErrorCode::new("checkpoint", "invalid_json"),
                    format!("checkpoint file is not valid: {error}"),
                )
                .with_metadata("path", self.path.display().to_string())
            })?;
            Ok(Some(checkpoint))
        })
    }

    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let json = serde_json::to_vec_pretty(&checkpoint).map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    format!("failed to encode checkpoint: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|error| self.io_error("mkdir", &error))?;
                }
            }
            let temp = self.temp_path();
            tokio::fs::write(&temp, json)
                .await
                .map_err(|error| self.io_error("write", &error))?;
            tokio::fs::rename(&temp, &self.path)
                .await
                .map_err(|error| self.io_error("rename", &error))?;
            tracing::debug!(
                repo = %checkpoint.repo_id,
                language = %checkpoint.language,
                chunks = checkpoint.chunks_processed,
                "checkpoint saved"
            );
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(self.io_error("remove", &error)),
            }
        })
    }
}
