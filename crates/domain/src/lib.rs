//! # code-ingest-domain
//!
//! Domain entities, primitives, and value objects for the ingestion pipeline.
//!
//! - **Primitives** - `RepoId`, `CollectionName`, `RecordId`
//! - **Chunks** - `CodeChunk`, `LineSpan`, `Language`
//! - **Repositories** - `RepoConfig`, `RepoType`, `ServiceBucket`
//! - **Collections** - `CollectionSet`, `CollectionLayout`, `Concern`
//! - **Checkpoints** - `Checkpoint`
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use code_ingest_shared::shared_crate_version;

pub mod checkpoint;
pub mod chunk;
pub mod collections;
pub mod language;
pub mod primitives;
pub mod repo;
pub mod spans;

pub use checkpoint::{Checkpoint, MAX_CHECKPOINT_ERRORS};
pub use chunk::{
    ChunkMetadata, CodeChunk, DEFAULT_ITEM_TYPE, METADATA_API_ENDPOINTS, METADATA_BUSINESS_DOMAIN,
    METADATA_IMPORTS,
};
pub use collections::{CollectionLayout, CollectionSet, Concern};
pub use language::Language;
pub use primitives::{CollectionName, PrimitiveError, RecordId, RepoId, derive_record_id};
pub use repo::{Priority, RepoConfig, RepoType, ServiceBucket};
pub use spans::LineSpan;

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
