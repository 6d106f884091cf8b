//! Resumable per-(repository, language) progress.

use chrono::Utc;
use code_ingest_domain::{Checkpoint, Language, RepoId};
use code_ingest_ports::CheckpointStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tracks the single in-flight checkpoint over a [`CheckpointStore`].
///
/// Store failures are logged and degrade to "no checkpoint"; they never stop
/// an ingestion run.
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointManager {
    /// Manager over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Persist progress for `(repo_id, language)`, replacing any stored checkpoint.
    ///
    /// Returns false when the store rejected the write.
    pub async fn save(
        &self,
        repo_id: &RepoId,
        language: Language,
        processed_files: impl IntoIterator<Item = String>,
        chunks_processed: u64,
        errors: impl IntoIterator<Item = String>,
    ) -> bool {
        let checkpoint = Checkpoint::new(
            repo_id.clone(),
            language,
            processed_files,
            chunks_processed,
            errors,
            Utc::now(),
        );
        let files = checkpoint.processed_files.len();
        match self.store.save(checkpoint).await {
            Ok(()) => {
                tracing::debug!(repo_id = %repo_id, language = %language, files, chunks = chunks_processed, "checkpoint saved");
                true
            },
            Err(error) => {
                tracing::warn!(repo_id = %repo_id, language = %language, code = %error.code, error = %error.message, "checkpoint save failed");
                false
            },
        }
    }

    /// The stored checkpoint, whatever pair it belongs to.
    pub async fn load_latest(&self) -> Option<Checkpoint> {
        match self.store.load().await {
            Ok(checkpoint) => checkpoint,
            Err(error) => {
                tracing::warn!(code = %error.code, error = %error.message, "checkpoint load failed");
                None
            },
        }
    }

    /// The stored checkpoint when it belongs to `(repo_id, language)`.
    pub async fn load(&self, repo_id: &RepoId, language: Language) -> Option<Checkpoint> {
        self.load_latest()
            .await
            .filter(|checkpoint| checkpoint.matches(repo_id, language))
    }

    /// Files already processed for `(repo_id, language)`; empty when the
    /// stored checkpoint belongs to another pair.
    pub async fn processed_files(&self, repo_id: &RepoId, language: Language) -> BTreeSet<String> {
        self.load(repo_id, language)
            .await
            .map(|checkpoint| checkpoint.processed_files)
            .unwrap_or_default()
    }

    /// Remove the stored checkpoint. Returns false when the store failed.
    pub async fn clear(&self) -> bool {
        match self.store.clear().await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(code = %error.code, error = %error.message, "checkpoint clear failed");
                false
            },
        }
    }
}

impl std::fmt::Debug for CheckpointManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("CheckpointManager").finish_non_exhaustive()
    }
}
