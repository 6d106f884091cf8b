//! Persisted progress of one `(repository, language)` ingestion run.

use crate::language::Language;
use crate::primitives::RepoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of most recent errors kept in a checkpoint.
pub const MAX_CHECKPOINT_ERRORS: usize = 5;

/// Resumable progress marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Repository being ingested.
    pub repo_id: RepoId,
    /// Language being ingested.
    pub language: Language,
    /// Repository-relative paths already processed.
    pub processed_files: BTreeSet<String>,
    /// Chunks stored so far for this pair.
    pub chunks_processed: u64,
    /// Most recent error messages, oldest first.
    pub errors: Vec<String>,
    /// When the checkpoint was written.
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Build a checkpoint, keeping only the last [`MAX_CHECKPOINT_ERRORS`] errors.
    pub fn new(
        repo_id: RepoId,
        language: Language,
        processed_files: impl IntoIterator<Item = String>,
        chunks_processed: u64,
        errors: impl IntoIterator<Item = String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            repo_id,
            language,
            processed_files: processed_files.into_iter().collect(),
            chunks_processed,
            errors: last_errors(errors),
            timestamp,
        }
    }

    /// Returns true when this checkpoint belongs to `(repo_id, language)`.
    #[must_use]
    pub fn matches(&self, repo_id: &RepoId, language: Language) -> bool {
        self.repo_id == *repo_id && self.language == language
    }
}

fn last_errors(errors: impl IntoIterator<Item = String>) -> Vec<String> {
    let errors: Vec<String> = errors.into_iter().collect();
    let skip = errors.len().saturating_sub(MAX_CHECKPOINT_ERRORS);
    errors.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveError;

    #[test]
    fn keeps_only_the_most_recent_errors() -> Result<(), PrimitiveError> {
        let errors = (1..=8).map(|n| format!("error {n}"));
        let checkpoint = Checkpoint::new(
            RepoId::parse("repoA")?,
            Language::Rust,
            Vec::new(),
            0,
            errors,
            Utc::now(),
        );

        assert_eq!(checkpoint.errors.len(), MAX_CHECKPOINT_ERRORS);
        assert_eq!(checkpoint.errors.first().map(String::as_str), Some("error 4"));
        assert_eq!(checkpoint.errors.last().map(String::as_str), Some("error 8"));
        Ok(())
    }

    #[test]
    fn matches_on_repo_and_language() -> Result<(), PrimitiveError> {
        let repo = RepoId::parse("repoA")?;
        let checkpoint = Checkpoint::new(
            repo.clone(),
            Language::Rust,
            vec!["a.rs".to_owned()],
            1,
            Vec::new(),
            Utc::now(),
        );

        assert!(checkpoint.matches(&repo, Language::Rust));
        assert!(!checkpoint.matches(&repo, Language::Yaml));
        assert!(!checkpoint.matches(&RepoId::parse("repoB")?, Language::Rust));
        Ok(())
    }

    #[test]
    fn serializes_with_snake_case_schema() -> Result<(), Box<dyn std::error::Error>> {
        let checkpoint = Checkpoint::new(
            RepoId::parse("repoA")?,
            Language::TypeScript,
            vec!["b.ts".to_owned(), "a.ts".to_owned()],
            2,
            Vec::new(),
            Utc::now(),
        );
        let json = serde_json::to_value(&checkpoint)?;

        assert_eq!(json["repo_id"], "repoA");
        assert_eq!(json["language"], "typescript");
        assert_eq!(json["processed_files"], serde_json::json!(["a.ts", "b.ts"]));
        assert_eq!(json["chunks_processed"], 2);
        Ok(())
    }
}
