//! User-visible summary of an ingestion run.

use crate::batch::StreamOutcome;
use code_ingest_domain::{CollectionName, Language};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Errors kept for display; `error_count` keeps counting past it.
pub const MAX_REPORT_ERRORS: usize = 50;

/// Aggregated totals of one or more `(repository, language)` runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    /// Files processed per language.
    pub files_by_language: BTreeMap<Language, usize>,
    /// Chunks stored into each collection.
    pub chunks_by_collection: BTreeMap<CollectionName, usize>,
    /// Business domains seen on chunks.
    pub business_domains: BTreeSet<String>,
    /// First errors, capped at [`MAX_REPORT_ERRORS`].
    pub errors: Vec<String>,
    /// Every error recorded, including those past the cap.
    pub error_count: usize,
    /// Files skipped because a checkpoint marked them processed.
    pub skipped_files: usize,
    /// Chunks stored.
    pub stored: usize,
    /// Chunks lost to permanently failed batches.
    pub lost: usize,
    /// Chunks skipped for size.
    pub oversized: usize,
}

impl IngestionReport {
    /// Count processed files of `language`.
    pub fn record_files(&mut self, language: Language, files: usize) {
        *self.files_by_language.entry(language).or_default() += files;
    }

    /// Remember a business domain.
    pub fn record_business_domain(&mut self, domain: &str) {
        let domain = domain.trim();
        if !domain.is_empty() && !self.business_domains.contains(domain) {
            self.business_domains.insert(domain.to_owned());
        }
    }

    /// Record an error message.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        if self.errors.len() < MAX_REPORT_ERRORS {
            self.errors.push(message.into());
        }
    }

    /// Add the totals of a streaming run.
    pub fn absorb(&mut self, outcome: &StreamOutcome) {
        self.stored += outcome.stored;
        self.lost += outcome.lost;
        self.oversized += outcome.oversized;
        for (name, count) in &outcome.stored_by_collection {
            *self.chunks_by_collection.entry(name.clone()).or_default() += count;
        }
        if !outcome.failed_batches.is_empty() {
            self.record_error(format!(
                "{} chunks lost in {} failed batches",
                outcome.lost,
                outcome.failed_batches.len()
            ));
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        for (language, files) in other.files_by_language {
            self.record_files(language, files);
        }
        for (name, count) in other.chunks_by_collection {
            *self.chunks_by_collection.entry(name).or_default() += count;
        }
        self.business_domains.extend(other.business_domains);
        let hidden = other.error_count.saturating_sub(other.errors.len());
        for error in other.errors {
            self.record_error(error);
        }
        self.error_count += hidden;
        self.skipped_files += other.skipped_files;
        self.stored += other.stored;
        self.lost += other.lost;
        self.oversized += other.oversized;
    }
}
