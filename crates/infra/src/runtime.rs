//! Composition of the ingestion pipeline from a validated config.

use crate::InfraResult;
use crate::embedding_factory::build_embedding_port;
use crate::vector_store_factory::build_vector_backend;
use code_ingest_adapters::{
    DEFAULT_WINDOW_LINES, FileCheckpointStore, LineWindowExtractor, scan_source_files,
};
use code_ingest_app::{
    BatchProcessor, CheckpointManager, CollectionAssigner, EmbeddingService,
    EmbeddingServiceOptions, EmbeddingStamp, IngestorOptions, PipelineOptions, RepoSources,
    RepositoryIngestor, SearchService, StorageManager,
};
use code_ingest_config::ValidatedIngestConfig;
use code_ingest_domain::{Language, RepoId};
use code_ingest_ports::{EmbeddingPort, ExtractorRegistry, VectorBackend};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, RequestContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fully wired services for one process.
pub struct IngestRuntime {
    config: ValidatedIngestConfig,
    backend: Arc<dyn VectorBackend>,
    storage: Arc<StorageManager>,
    ingestor: RepositoryIngestor,
    search: SearchService,
}

impl IngestRuntime {
    /// Build every service from config, selecting adapters by provider.
    pub fn build(config: ValidatedIngestConfig) -> InfraResult<Self> {
        let port = build_embedding_port(&config)?;
        let backend = build_vector_backend(&config)?;
        Self::with_adapters(config, port, backend)
    }

    /// Build with explicit embedding and vector adapters.
    pub fn with_adapters(
        config: ValidatedIngestConfig,
        port: Arc<dyn EmbeddingPort>,
        backend: Arc<dyn VectorBackend>,
    ) -> InfraResult<Self> {
        let embedding = Arc::new(EmbeddingService::new(port, embedding_options(&config))?);
        let storage = Arc::new(StorageManager::new(
            Arc::clone(&backend),
            EmbeddingStamp {
                model: config.embedding.model.clone(),
                dimension: config.embedding.dimension,
            },
            config.storage_retry_policy(),
        )?);
        let checkpoints = CheckpointManager::new(Arc::new(FileCheckpointStore::new(
            PathBuf::from(&*config.checkpoint.path),
        )));
        let processor = BatchProcessor::new(
            Arc::clone(&embedding),
            Arc::clone(&storage),
            pipeline_options(&config),
        )?;
        let ingestor = RepositoryIngestor::new(
            extractor_registry()?,
            CollectionAssigner::new(config.layout().clone()),
            processor,
            checkpoints,
            Arc::clone(&storage),
            ingestor_options(&config),
        )?;
        let search = SearchService::new(embedding, Arc::clone(&backend));

        Ok(Self {
            config,
            backend,
            storage,
            ingestor,
            search,
        })
    }

    /// The config the runtime was built from.
    #[must_use]
    pub const fn config(&self) -> &ValidatedIngestConfig {
        &self.config
    }

    /// The selected vector backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Storage manager over the backend.
    #[must_use]
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Repository ingestor.
    #[must_use]
    pub const fn ingestor(&self) -> &RepositoryIngestor {
        &self.ingestor
    }

    /// Checkpoint manager.
    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointManager {
        self.ingestor.checkpoints()
    }

    /// Search service.
    #[must_use]
    pub const fn search(&self) -> &SearchService {
        &self.search
    }

    /// Scan configured repository roots for source files.
    ///
    /// With `only`, just that repository is scanned; `root_override` then
    /// replaces its configured root.
    pub async fn discover_sources(
        &self,
        ctx: &RequestContext,
        only: Option<&RepoId>,
        root_override: Option<&Path>,
    ) -> InfraResult<Vec<RepoSources>> {
        let selected: Vec<_> = self
            .config
            .repos()
            .iter()
            .filter(|repo| only.is_none_or(|id| &repo.repo_id == id))
            .cloned()
            .collect();
        if let Some(id) = only {
            if selected.is_empty() {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::not_found(),
                    format!("repository {id} is not configured"),
                )
                .with_metadata("repo_id", id.as_str()));
            }
        }

        let mut sources = Vec::with_capacity(selected.len());
        for repo in selected {
            let root = match (root_override, self.config.repo_root(&repo.repo_id)) {
                (Some(root), _) if only.is_some() => root.to_path_buf(),
                (_, Some(root)) => PathBuf::from(root),
                (_, None) => {
                    return Err(ErrorEnvelope::expected(
                        ErrorCode::invalid_input(),
                        format!("repository {} has no root", repo.repo_id),
                    ));
                },
            };
            let files = scan_source_files(ctx, &root, &repo.languages).await?;
            tracing::info!(
                repo_id = %repo.repo_id,
                root = %root.display(),
                files = files.len(),
                "repository scanned"
            );
            sources.push(RepoSources { repo, files });
        }
        Ok(sources)
    }
}

impl std::fmt::Debug for IngestRuntime {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("IngestRuntime")
            .field("backend", &self.backend.provider_id())
            .field("ingestor", &self.ingestor)
            .finish_non_exhaustive()
    }
}

/// Embedding service tuning from `embedding.*`.
#[must_use]
pub fn embedding_options(config: &ValidatedIngestConfig) -> EmbeddingServiceOptions {
    EmbeddingServiceOptions {
        rate_limit: to_usize(config.embedding.rate_limit),
        timeout: Duration::from_millis(config.embedding.timeout_ms),
        retry: config.embedding_retry_policy(),
    }
}

/// Batch sizing from `pipeline.*`.
#[must_use]
pub fn pipeline_options(config: &ValidatedIngestConfig) -> PipelineOptions {
    PipelineOptions {
        batch_size: to_usize(config.pipeline.batch_size),
        max_workers: to_usize(config.pipeline.max_workers),
        max_retries: config.pipeline.max_retries,
        max_chunk_chars: to_usize(config.pipeline.max_chunk_chars),
    }
}

/// Ingestor options from `pipeline.*` and `storage.*`.
#[must_use]
pub fn ingestor_options(config: &ValidatedIngestConfig) -> IngestorOptions {
    IngestorOptions {
        checkpoint_every_files: to_usize(config.pipeline.checkpoint_every_files),
        recreate_collections: config.storage.recreate_collections,
    }
}

/// One line-window extractor per supported language.
pub fn extractor_registry() -> InfraResult<ExtractorRegistry> {
    let mut registry = ExtractorRegistry::new();
    for language in Language::ALL {
        registry = registry.with(Arc::new(LineWindowExtractor::new(language, DEFAULT_WINDOW_LINES)?));
    }
    Ok(registry)
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
