//! In-process vector store with optional JSON snapshots.

use code_ingest_ports::{
    BoxFuture, CollectionInfo, CollectionName, CollectionStatus, RecordId, RecordPayload,
    SearchHit, SearchRequest, VectorBackend, VectorRecord,
};
use code_ingest_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const LOCAL_SNAPSHOT_VERSION: u32 = 1;

/// Local vector store using exhaustive cosine similarity.
///
/// When a snapshot directory is configured, every mutation rewrites the
/// collection's `<name>.json` file and reads fall back to it on first access.
/// Snapshot writes of one collection are serialized and always capture the
/// collection as it is when the write starts.
#[derive(Clone)]
pub struct LocalVectorStore {
    snapshot_dir: Option<PathBuf>,
    collections: Arc<RwLock<HashMap<CollectionName, LocalCollection>>>,
    writers: Arc<Mutex<HashMap<CollectionName, Arc<Mutex<()>>>>>,
}

impl LocalVectorStore {
    /// Purely in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            snapshot_dir: None,
            collections: Arc::new(RwLock::new(HashMap::new())),
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store persisted under `snapshot_dir`.
    #[must_use]
    pub fn with_snapshots(snapshot_dir: PathBuf) -> Self {
        Self {
            snapshot_dir: Some(snapshot_dir),
            collections: Arc::new(RwLock::new(HashMap::new())),
            writers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn snapshot_path(&self, collection: &CollectionName) -> Option<PathBuf> {
        self.snapshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", collection.as_str())))
    }

    async fn ensure_loaded(&self, collection: &CollectionName) -> Result<bool> {
        if self.collections.read().await.contains_key(collection) {
            return Ok(true);
        }

        let Some(snapshot) = self.read_snapshot(collection).await? else {
            return Ok(false);
        };
        let loaded = LocalCollection::from_snapshot(snapshot)?;
        self.collections
            .write()
            .await
            .entry(collection.clone())
            .or_insert(loaded);
        Ok(true)
    }

    async fn read_snapshot(&self, collection: &CollectionName) -> Result<Option<CollectionSnapshot>> {
        let Some(path) = self.snapshot_path(collection) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(payload) => {
                let snapshot = serde_json::from_slice(&payload).map_err(|error| {
                    snapshot_error("snapshot_parse_failed", "failed to parse snapshot", error)
                        .with_metadata("path", path.display().to_string())
                })?;
                Ok(Some(snapshot))
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ErrorEnvelope::from(error)),
        }
    }

    async fn writer(&self, collection: &CollectionName) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        Arc::clone(writers.entry(collection.clone()).or_default())
    }

    /// Write the current state of `collection` to disk.
    async fn persist(&self, collection: &CollectionName) -> Result<()> {
        if self.snapshot_dir.is_none() {
            return Ok(());
        }
        let writer = self.writer(collection).await;
        let _guard = writer.lock().await;
        let snapshot = self
            .collections
            .read()
            .await
            .get(collection)
            .map(LocalCollection::snapshot);
        match snapshot {
            Some(snapshot) => self.write_snapshot(collection, &snapshot).await,
            None => Ok(()),
        }
    }

    async fn write_snapshot(
        &self,
        collection: &CollectionName,
        snapshot: &CollectionSnapshot,
    ) -> Result<()> {
        let Some(path) = self.snapshot_path(collection) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ErrorEnvelope::from)?;
        }
        let payload = serde_json::to_vec(snapshot).map_err(|error| {
            snapshot_error(
                "snapshot_serialize_failed",
                "failed to serialize snapshot",
                error,
            )
        })?;
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, payload)
            .await
            .map_err(ErrorEnvelope::from)?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(ErrorEnvelope::from)
    }
}

impl VectorBackend for LocalVectorStore {
    fn provider_id(&self) -> &str {
        "local"
    }

    fn create_collection(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        dimension: u32,
        recreate: bool,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("vector_local.create_collection")?;
            if !recreate && self.ensure_loaded(&collection).await? {
                let guard = self.collections.read().await;
                let existing = guard.get(&collection).map(|stored| stored.dimension);
                drop(guard);
                return match existing {
                    Some(existing) if existing != dimension => Err(dimension_mismatch(
                        &collection,
                        existing,
                        dimension,
                    )),
                    _ => Ok(()),
                };
            }

            self.collections
                .write()
                .await
                .insert(collection.clone(), LocalCollection::new(dimension));
            tracing::debug!(collection = %collection, dimension, "local collection created");
            self.persist(&collection).await
        })
    }

    fn upsert(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("vector_local.upsert")?;
            if !self.ensure_loaded(&collection).await? {
                return Err(collection_not_found(&collection));
            }

            let mut guard = self.collections.write().await;
            let Some(stored) = guard.get_mut(&collection) else {
                return Err(collection_not_found(&collection));
            };
            stored.upsert(&collection, records)?;
            drop(guard);
            self.persist(&collection).await
        })
    }

    fn search(
        &self,
        ctx: &RequestContext,
        request: SearchRequest,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("vector_local.search")?;
            if !self.ensure_loaded(&request.collection).await? {
                return Err(collection_not_found(&request.collection));
            }

            let guard = self.collections.read().await;
            let Some(stored) = guard.get(&request.collection) else {
                return Err(collection_not_found(&request.collection));
            };
            let hits = stored.search(&request);
            drop(guard);
            Ok(hits)
        })
    }

    fn collection_info(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
    ) -> BoxFuture<'_, Result<CollectionInfo>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("vector_local.collection_info")?;
            if !self.ensure_loaded(&collection).await? {
                return Err(collection_not_found(&collection));
            }
            let count = self
                .collections
                .read()
                .await
                .get(&collection)
                .map_or(0, |stored| stored.records.len());
            Ok(CollectionInfo {
                name: collection,
                count: u64::try_from(count).unwrap_or(u64::MAX),
                status: CollectionStatus::Green,
            })
        })
    }
}

struct LocalCollection {
    dimension: u32,
    records: BTreeMap<RecordId, StoredRecord>,
}

struct StoredRecord {
    vector: Arc<[f32]>,
    norm: f32,
    payload: RecordPayload,
}

impl LocalCollection {
    const fn new(dimension: u32) -> Self {
        Self {
            dimension,
            records: BTreeMap::new(),
        }
    }

    fn upsert(&mut self, collection: &CollectionName, records: Vec<VectorRecord>) -> Result<()> {
        let expected = usize::try_from(self.dimension).unwrap_or(usize::MAX);
        if let Some(bad) = records.iter().find(|record| record.vector.len() != expected) {
            return Err(dimension_mismatch(
                collection,
                self.dimension,
                u32::try_from(bad.vector.len()).unwrap_or(u32::MAX),
            ));
        }
        for record in records {
            let norm = l2_norm(&record.vector);
            self.records.insert(
                record.id,
                StoredRecord {
                    vector: record.vector,
                    norm,
                    payload: record.payload,
                },
            );
        }
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> Vec<SearchHit> {
        let query_norm = l2_norm(&request.vector);
        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .map(|(id, stored)| SearchHit {
                id: id.clone(),
                score: cosine(&request.vector, query_norm, &stored.vector, stored.norm),
                payload: stored.payload.clone(),
            })
            .filter(|hit| request.score_threshold.is_none_or(|min| hit.score >= min))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(usize::try_from(request.limit.max(1)).unwrap_or(usize::MAX));
        hits
    }

    fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot {
            version: LOCAL_SNAPSHOT_VERSION,
            dimension: self.dimension,
            records: self
                .records
                .iter()
                .map(|(id, stored)| SnapshotRecord {
                    id: id.clone(),
                    vector: stored.vector.to_vec(),
                    payload: stored.payload.clone(),
                })
                .collect(),
        }
    }

    fn from_snapshot(snapshot: CollectionSnapshot) -> Result<Self> {
        if snapshot.version != LOCAL_SNAPSHOT_VERSION {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("vector", "snapshot_version_mismatch"),
                "unsupported local snapshot version",
            )
            .with_metadata("found", snapshot.version.to_string())
            .with_metadata("supported", LOCAL_SNAPSHOT_VERSION.to_string()));
        }
        let mut collection = Self::new(snapshot.dimension);
        for record in snapshot.records {
            let vector: Arc<[f32]> = Arc::from(record.vector);
            collection.records.insert(
                record.id,
                StoredRecord {
                    norm: l2_norm(&vector),
                    vector,
                    payload: record.payload,
                },
            );
        }
        Ok(collection)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionSnapshot {
    version: u32,
    dimension: u32,
    records: Vec<SnapshotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    id: RecordId,
    vector: Vec<f32>,
    payload: RecordPayload,
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

fn collection_not_found(collection: &CollectionName) -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::not_found(), "collection not found")
        .with_metadata("collection", collection.as_str())
}

fn dimension_mismatch(collection: &CollectionName, expected: u32, actual: u32) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("vector", "dimension_mismatch"),
        "vector dimension does not match the collection",
    )
    .with_metadata("collection", collection.as_str())
    .with_metadata("expected", expected.to_string())
    .with_metadata("actual", actual.to_string())
}

fn snapshot_error(code: &'static str, message: &str, error: impl std::error::Error) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("vector", code),
        format!("{message}: {error}"),
        ErrorClass::NonRetriable,
    )
}
