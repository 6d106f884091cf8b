//! Drives extraction, routing, streaming and checkpointing per repository.

use crate::assigner::CollectionAssigner;
use crate::batch::{BatchProcessor, RoutedChunk};
use crate::checkpoint::CheckpointManager;
use crate::report::IngestionReport;
use crate::storage::StorageManager;
use code_ingest_domain::{CodeChunk, Language, METADATA_BUSINESS_DOMAIN, RepoConfig};
use code_ingest_ports::{ExtractorRegistry, SourceFile};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Options of [`RepositoryIngestor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestorOptions {
    /// Files streamed between two checkpoint saves.
    pub checkpoint_every_files: usize,
    /// Drop and recreate collections before `ingest_all`.
    pub recreate_collections: bool,
}

impl Default for IngestorOptions {
    fn default() -> Self {
        Self {
            checkpoint_every_files: 10,
            recreate_collections: false,
        }
    }
}

/// One repository and the source files discovered in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSources {
    /// Repository classification.
    pub repo: RepoConfig,
    /// Files to ingest, any language.
    pub files: Vec<SourceFile>,
}

/// Ingests repositories one `(repository, language)` pair at a time.
pub struct RepositoryIngestor {
    extractors: ExtractorRegistry,
    assigner: CollectionAssigner,
    processor: BatchProcessor,
    checkpoints: CheckpointManager,
    storage: Arc<StorageManager>,
    options: IngestorOptions,
}

impl RepositoryIngestor {
    /// Wire the ingestor.
    pub fn new(
        extractors: ExtractorRegistry,
        assigner: CollectionAssigner,
        processor: BatchProcessor,
        checkpoints: CheckpointManager,
        storage: Arc<StorageManager>,
        options: IngestorOptions,
    ) -> Result<Self> {
        if options.checkpoint_every_files == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "checkpoint_every_files must be greater than zero",
            ));
        }
        Ok(Self {
            extractors,
            assigner,
            processor,
            checkpoints,
            storage,
            options,
        })
    }

    /// Checkpoint access for callers that inspect or reset progress.
    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Ingest the `language` files of `repo`, resuming from its checkpoint.
    ///
    /// Files of other languages are ignored. A group of files is marked
    /// processed only when none of its chunks were lost, so a resumed run
    /// retries them.
    #[tracing::instrument(
        name = "ingest.repo_language",
        skip_all,
        fields(repo_id = %repo.repo_id, language = %language)
    )]
    pub async fn ingest(
        &self,
        ctx: &RequestContext,
        repo: &RepoConfig,
        language: Language,
        files: Vec<SourceFile>,
    ) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();
        let resume = self.checkpoints.load(&repo.repo_id, language).await;
        let (mut processed, mut chunks_processed, mut errors) = resume.map_or_else(
            || (BTreeSet::new(), 0u64, Vec::new()),
            |checkpoint| {
                (
                    checkpoint.processed_files,
                    checkpoint.chunks_processed,
                    checkpoint.errors,
                )
            },
        );

        let candidates: Vec<SourceFile> = files
            .into_iter()
            .filter(|file| file.language == language)
            .collect();
        let total = candidates.len();
        let pending: Vec<SourceFile> = candidates
            .into_iter()
            .filter(|file| !processed.contains(&*file.relative_path))
            .collect();
        report.skipped_files = total - pending.len();
        if report.skipped_files > 0 {
            tracing::info!(skipped = report.skipped_files, "resuming from checkpoint");
        }

        for group in pending.chunks(self.options.checkpoint_every_files) {
            ctx.ensure_not_cancelled("ingest.repo_language")?;
            let mut routed = Vec::new();
            let mut extracted_paths = Vec::new();

            for file in group {
                match self.extractors.extract(ctx, file.clone()).await {
                    Ok(chunks) => {
                        extracted_paths.push(file.relative_path.to_string());
                        for chunk in chunks {
                            routed.push(self.route(&mut report, chunk, repo, language));
                        }
                    },
                    Err(error) if error.is_cancelled() => return Err(error),
                    Err(error) => {
                        let message = format!("{}: {}", file.relative_path, error.message);
                        tracing::warn!(path = %file.relative_path, code = %error.code, "extraction failed");
                        report.record_error(message.clone());
                        errors.push(message);
                    },
                }
            }
            report.record_files(language, extracted_paths.len());

            let mut group_complete = true;
            if !routed.is_empty() {
                let outcome = self.processor.stream_routed(ctx, routed, language).await?;
                report.absorb(&outcome);
                chunks_processed = chunks_processed.saturating_add(outcome.stored as u64);
                if outcome.lost > 0 {
                    group_complete = false;
                    errors.push(format!(
                        "{} chunks lost in batches {:?}",
                        outcome.lost, outcome.failed_batches
                    ));
                }
            }
            if group_complete {
                processed.extend(extracted_paths);
            }

            self.checkpoints
                .save(&repo.repo_id, language, processed.iter().cloned(), chunks_processed, errors.iter().cloned())
                .await;
        }

        self.checkpoints
            .save(&repo.repo_id, language, processed, chunks_processed, errors)
            .await;
        tracing::info!(
            stored = report.stored,
            lost = report.lost,
            files = report.files_by_language.get(&language).copied().unwrap_or_default(),
            "repository language ingested"
        );
        Ok(report)
    }

    /// Ingest every repository and language, highest priority first.
    ///
    /// Collections are created up front. The checkpoint is cleared only when
    /// every pair completed without lost chunks.
    #[tracing::instrument(name = "ingest.all", skip_all, fields(repos = repos.len()))]
    pub async fn ingest_all(
        &self,
        ctx: &RequestContext,
        mut repos: Vec<RepoSources>,
    ) -> Result<IngestionReport> {
        self.storage
            .ensure_collections(ctx, &self.assigner.layout().all(), self.options.recreate_collections)
            .await?;

        repos.sort_by_key(|sources| sources.repo.priority);
        let mut report = IngestionReport::default();
        let mut clean = true;

        for sources in repos {
            for &language in &sources.repo.languages {
                let files: Vec<SourceFile> = sources
                    .files
                    .iter()
                    .filter(|file| file.language == language)
                    .cloned()
                    .collect();
                if files.is_empty() {
                    tracing::debug!(repo_id = %sources.repo.repo_id, language = %language, "no files");
                    continue;
                }
                match self.ingest(ctx, &sources.repo, language, files).await {
                    Ok(pair) => {
                        clean &= pair.lost == 0;
                        report.merge(pair);
                    },
                    Err(error) if error.is_cancelled() => return Err(error),
                    Err(error) => {
                        clean = false;
                        tracing::error!(
                            repo_id = %sources.repo.repo_id,
                            language = %language,
                            code = %error.code,
                            error = %error.message,
                            "repository language failed"
                        );
                        report.record_error(format!(
                            "{}/{}: {}",
                            sources.repo.repo_id, language, error.message
                        ));
                    },
                }
            }
        }

        if clean {
            self.checkpoints.clear().await;
        }
        Ok(report)
    }

    fn route(
        &self,
        report: &mut IngestionReport,
        chunk: CodeChunk,
        repo: &RepoConfig,
        language: Language,
    ) -> RoutedChunk {
        let missing_domain = chunk.business_domain().is_none();
        let chunk = match &repo.business_domain {
            Some(domain) if missing_domain => {
                chunk.with_metadata(METADATA_BUSINESS_DOMAIN, domain.as_str())
            },
            _ => chunk,
        };
        if let Some(domain) = chunk.business_domain() {
            report.record_business_domain(domain);
        }
        let collections = self.assigner.target_collections(&chunk, repo, language);
        RoutedChunk { chunk, collections }
    }
}

impl std::fmt::Debug for RepositoryIngestor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RepositoryIngestor")
            .field("extractors", &self.extractors)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
