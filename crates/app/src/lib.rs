//! # code-ingest-app
//!
//! Ingestion use cases: embedding, collection routing, batch streaming,
//! checkpointing and search.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod assigner;
pub mod batch;
pub mod checkpoint;
pub mod embedding_service;
pub mod ingestor;
pub mod report;
pub mod search;
pub mod storage;

pub use assigner::{CollectionAssigner, concerns};
pub use batch::{
    BatchEvent, BatchProcessor, BatchState, PipelineOptions, RoutedChunk, StreamOutcome,
};
pub use checkpoint::CheckpointManager;
pub use embedding_service::{EmbeddingService, EmbeddingServiceOptions};
pub use ingestor::{IngestorOptions, RepoSources, RepositoryIngestor};
pub use report::{IngestionReport, MAX_REPORT_ERRORS};
pub use search::{MAX_SEARCH_LIMIT, SearchService};
pub use storage::{EmbeddingStamp, StorageManager, StoreOutcome};

/// Crate version, for diagnostics.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
