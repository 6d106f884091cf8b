//! Vector store boundary contract.

use crate::BoxFuture;
use code_ingest_domain::{CollectionName, RecordId};
use code_ingest_shared::{RequestContext, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// JSON payload stored alongside a vector.
pub type RecordPayload = Map<String, Value>;

/// The durable unit written to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Deterministic record id; re-upserting the same id overwrites.
    pub id: RecordId,
    /// Dense vector.
    pub vector: Arc<[f32]>,
    /// Denormalized chunk fields plus indexing metadata.
    pub payload: RecordPayload,
}

/// A search hit ordered by similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Record id.
    pub id: RecordId,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Stored payload.
    pub payload: RecordPayload,
}

/// Owned search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Target collection.
    pub collection: CollectionName,
    /// Query vector.
    pub vector: Arc<[f32]>,
    /// Maximum number of hits.
    pub limit: u32,
    /// Minimum score; hits below are dropped.
    pub score_threshold: Option<f32>,
}

/// Health of a collection as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStatus {
    /// Ready for reads and writes.
    Green,
    /// Usable, optimizations pending.
    Yellow,
    /// Failing.
    Red,
    /// Backend-specific status string.
    Other(Box<str>),
}

impl CollectionStatus {
    /// Map a backend status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "green" => Self::Green,
            "yellow" => Self::Yellow,
            "red" => Self::Red,
            other => Self::Other(Box::from(other)),
        }
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: CollectionName,
    /// Number of stored records.
    pub count: u64,
    /// Backend-reported status.
    pub status: CollectionStatus,
}

/// Boundary contract for vector storage and retrieval.
pub trait VectorBackend: Send + Sync {
    /// Stable backend identifier (`local`, `qdrant`).
    fn provider_id(&self) -> &str;

    /// Create a collection of the given dimension.
    ///
    /// Idempotent when the collection exists, unless `recreate` is set, in
    /// which case it is dropped and created empty.
    fn create_collection(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        dimension: u32,
        recreate: bool,
    ) -> BoxFuture<'_, Result<()>>;

    /// Insert or overwrite records by id.
    fn upsert(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<()>>;

    /// K-nearest-neighbour search, ordered by score descending.
    fn search(
        &self,
        ctx: &RequestContext,
        request: SearchRequest,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>>>;

    /// Record count and status of a collection.
    fn collection_info(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
    ) -> BoxFuture<'_, Result<CollectionInfo>>;
}
