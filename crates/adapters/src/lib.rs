//! # code-ingest-adapters
//!
//! Adapter implementations for the ports: embedding providers, vector stores,
//! the checkpoint file, line-window extraction and repository scanning.
//! This crate depends on `ports`, `shared`, `domain` and `config`.

/// Embedding providers.
pub mod embedding;

pub mod checkpoint_file;
pub mod extractor;
pub mod scan;
/// Vector store backends.
pub mod vector_store;

pub use checkpoint_file::FileCheckpointStore;
pub use embedding::hashed::HashedEmbedding;
#[cfg(feature = "openai")]
pub use embedding::openai::{OpenAiEmbedding, OpenAiEmbeddingConfig};
pub use extractor::{DEFAULT_WINDOW_LINES, LineWindowExtractor};
pub use scan::scan_source_files;
pub use vector_store::local::LocalVectorStore;
#[cfg(feature = "qdrant")]
pub use vector_store::qdrant::{QdrantConfig, QdrantVectorStore};

/// Crate version, used by the CLI banner and dependency checks.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
