//! Fan-out of embedded chunks to their target collections.

use chrono::{SecondsFormat, Utc};
use code_ingest_domain::{CodeChunk, CollectionSet, Language};
use code_ingest_ports::{
    CollectionName, EmbeddingVector, RecordPayload, VectorBackend, VectorRecord,
};
use code_ingest_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy, retry_async,
    retry_async_with_observer,
};
use serde_json::Value;
use std::sync::Arc;

/// Result of storing one group of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreOutcome {
    /// Chunks accepted by at least one collection.
    pub stored: usize,
    /// Collections that accepted the records.
    pub stored_collections: Vec<CollectionName>,
    /// Collections whose upsert failed after retries.
    pub failed_collections: Vec<CollectionName>,
}

/// Embedding metadata stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingStamp {
    /// Model that produced the vectors.
    pub model: Box<str>,
    /// Vector dimension.
    pub dimension: u32,
}

/// Builds vector records and upserts them into every target collection.
///
/// Collections are written independently. A failure on one collection never
/// rolls back another, so the store is at-least-one-collection, not atomic.
#[derive(Clone)]
pub struct StorageManager {
    backend: Arc<dyn VectorBackend>,
    stamp: EmbeddingStamp,
    retry: RetryPolicy,
}

impl StorageManager {
    /// Manager over `backend` with a per-collection retry policy.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        stamp: EmbeddingStamp,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            backend,
            stamp,
            retry: retry.validate()?,
        })
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Create every collection in `names` ahead of a run.
    #[tracing::instrument(name = "storage.ensure_collections", skip_all, fields(collections = names.len(), recreate = recreate))]
    pub async fn ensure_collections(
        &self,
        ctx: &RequestContext,
        names: &[CollectionName],
        recreate: bool,
    ) -> Result<()> {
        for name in names {
            let create = |_attempt: u32| {
                self.backend
                    .create_collection(ctx, name.clone(), self.stamp.dimension, recreate)
            };
            retry_async(ctx, self.retry, "storage.create_collection", create)
                .await
                .map_err(|error| error.with_metadata("collection", name.as_str()))?;
        }
        tracing::info!(collections = names.len(), "collections ready");
        Ok(())
    }

    /// Store `chunks` with their `vectors` into every collection of `collections`.
    ///
    /// Returns `Ok` when at least one collection accepted the records and
    /// `Err` only when every collection failed.
    pub async fn store_chunks(
        &self,
        ctx: &RequestContext,
        chunks: &[CodeChunk],
        vectors: Vec<EmbeddingVector>,
        collections: &CollectionSet,
        language: Language,
    ) -> Result<StoreOutcome> {
        if chunks.len() != vectors.len() {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::new("pipeline", "store_count_mismatch"),
                format!("{} chunks but {} vectors", chunks.len(), vectors.len()),
            ));
        }
        if chunks.is_empty() {
            return Ok(StoreOutcome::default());
        }

        let indexed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk.record_id(),
                vector: vector.into_vector(),
                payload: self.payload(chunk, language, &indexed_at),
            })
            .collect();

        let mut outcome = StoreOutcome::default();
        let mut last_error = None;
        for collection in collections {
            let mut upsert = |_attempt: u32| {
                self.backend
                    .upsert(ctx, collection.clone(), records.clone())
            };
            let result = retry_async_with_observer(
                ctx,
                self.retry,
                "storage.upsert",
                &mut upsert,
                |attempt, error, _delay| {
                    tracing::warn!(collection = %collection, attempt, code = %error.code, "upsert failed, retrying");
                },
            )
            .await;
            match result {
                Ok(()) => outcome.stored_collections.push(collection.clone()),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    tracing::error!(
                        collection = %collection,
                        records = records.len(),
                        code = %error.code,
                        error = %error.message,
                        "upsert failed"
                    );
                    outcome.failed_collections.push(collection.clone());
                    last_error = Some(error);
                },
            }
        }

        if outcome.stored_collections.is_empty() {
            let error = last_error.unwrap_or_else(|| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("vector", "store_failed"),
                    "no collection accepted the records",
                    ErrorClass::NonRetriable,
                )
            });
            return Err(error.with_metadata("collections", collections.len().to_string()));
        }

        outcome.stored = chunks.len();
        tracing::debug!(
            chunks = outcome.stored,
            collections = outcome.stored_collections.len(),
            failed = outcome.failed_collections.len(),
            "chunks stored"
        );
        Ok(outcome)
    }

    fn payload(&self, chunk: &CodeChunk, language: Language, indexed_at: &str) -> RecordPayload {
        let mut payload = RecordPayload::new();
        payload.insert("file_path".to_owned(), chunk.file_path().into());
        payload.insert("content".to_owned(), chunk.content().into());
        payload.insert("start_line".to_owned(), chunk.start_line().into());
        payload.insert("end_line".to_owned(), chunk.end_line().into());
        payload.insert("item_name".to_owned(), chunk.item_name().into());
        payload.insert("item_type".to_owned(), chunk.item_type().into());
        payload.insert("language".to_owned(), language.as_str().into());
        for (key, value) in chunk.metadata() {
            payload.entry(key.clone()).or_insert_with(|| value.clone());
        }
        payload.insert("indexed_at".to_owned(), indexed_at.into());
        payload.insert("embedding_model".to_owned(), Value::from(&*self.stamp.model));
        payload.insert("embedding_dimensions".to_owned(), self.stamp.dimension.into());
        payload
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StorageManager")
            .field("backend", &self.backend.provider_id())
            .field("stamp", &self.stamp)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_adapters::LocalVectorStore;
    use code_ingest_domain::LineSpan;
    use code_ingest_ports::{BoxFuture, CollectionInfo, SearchHit, SearchRequest};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Local store that rejects every upsert into the listed collections.
    struct FailingFor {
        inner: LocalVectorStore,
        failing: BTreeSet<String>,
        upserts: Mutex<Vec<String>>,
    }

    impl VectorBackend for FailingFor {
        fn provider_id(&self) -> &str {
            "failing"
        }

        fn create_collection(
            &self,
            ctx: &RequestContext,
            collection: CollectionName,
            dimension: u32,
            recreate: bool,
        ) -> BoxFuture<'_, Result<()>> {
            self.inner.create_collection(ctx, collection, dimension, recreate)
        }

        fn upsert(
            &self,
            ctx: &RequestContext,
            collection: CollectionName,
            records: Vec<VectorRecord>,
        ) -> BoxFuture<'_, Result<()>> {
            if let Ok(mut upserts) = self.upserts.lock() {
                upserts.push(collection.as_str().to_owned());
            }
            if self.failing.contains(collection.as_str()) {
                return Box::pin(async {
                    Err(ErrorEnvelope::unexpected(
                        ErrorCode::dependency_unavailable(),
                        "down",
                        ErrorClass::Retriable,
                    ))
                });
            }
            self.inner.upsert(ctx, collection, records)
        }

        fn search(
            &self,
            ctx: &RequestContext,
            request: SearchRequest,
        ) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
            self.inner.search(ctx, request)
        }

        fn collection_info(
            &self,
            ctx: &RequestContext,
            collection: CollectionName,
        ) -> BoxFuture<'_, Result<CollectionInfo>> {
            self.inner.collection_info(ctx, collection)
        }
    }

    fn name(raw: &str) -> Result<CollectionName> {
        CollectionName::parse(raw).map_err(ErrorEnvelope::from)
    }

    fn chunks() -> Result<Vec<CodeChunk>> {
        (1..=3)
            .map(|line| {
                let span = LineSpan::new(line, line).map_err(ErrorEnvelope::from)?;
                CodeChunk::new("src/lib.rs", Language::Rust, span, format!("line {line}"))
                    .map(|chunk| chunk.with_item("lib", "block").with_metadata("business_domain", "billing"))
                    .map_err(ErrorEnvelope::from)
            })
            .collect()
    }

    fn vectors(count: usize) -> Vec<EmbeddingVector> {
        (0..count).map(|_| EmbeddingVector::from_vec(vec![1.0, 0.0])).collect()
    }

    fn stamp() -> EmbeddingStamp {
        EmbeddingStamp {
            model: "hashed-v1".into(),
            dimension: 2,
        }
    }

    async fn setup(failing: &[&str]) -> Result<(Arc<FailingFor>, StorageManager, CollectionSet)> {
        let backend = Arc::new(FailingFor {
            inner: LocalVectorStore::in_memory(),
            failing: failing.iter().map(|name| (*name).to_owned()).collect(),
            upserts: Mutex::new(Vec::new()),
        });
        let manager = StorageManager::new(backend.clone(), stamp(), RetryPolicy::exponential(2, 1, 1))?;
        let set = CollectionSet::from_names([name("rust_code")?, name("backend_services")?])
            .map_err(ErrorEnvelope::from)?;
        manager
            .ensure_collections(&RequestContext::new_request(), set.as_slice(), false)
            .await?;
        Ok((backend, manager, set))
    }

    #[tokio::test]
    async fn records_land_in_every_collection_with_metadata() -> Result<()> {
        let (backend, manager, set) = setup(&[]).await?;
        let ctx = RequestContext::new_request();
        let chunks = chunks()?;

        let outcome = manager.store_chunks(&ctx, &chunks, vectors(3), &set, Language::Rust).await?;
        assert_eq!(outcome.stored, 3);
        assert!(outcome.failed_collections.is_empty());

        for collection in &set {
            let info = backend.collection_info(&ctx, collection.clone()).await?;
            assert_eq!(info.count, 3);
        }

        let hits = backend
            .search(
                &ctx,
                SearchRequest {
                    collection: name("rust_code")?,
                    vector: Arc::from(vec![1.0_f32, 0.0]),
                    limit: 1,
                    score_threshold: None,
                },
            )
            .await?;
        let payload = hits.first().map(|hit| hit.payload.clone()).unwrap_or_default();
        assert_eq!(payload.get("embedding_model"), Some(&Value::from("hashed-v1")));
        assert_eq!(payload.get("embedding_dimensions"), Some(&Value::from(2)));
        assert_eq!(payload.get("business_domain"), Some(&Value::from("billing")));
        assert!(payload.get("indexed_at").is_some_and(Value::is_string));
        Ok(())
    }

    #[tokio::test]
    async fn one_failing_collection_does_not_roll_back_the_others() -> Result<()> {
        let (backend, manager, set) = setup(&["backend_services"]).await?;
        let ctx = RequestContext::new_request();

        let outcome = manager
            .store_chunks(&ctx, &chunks()?, vectors(3), &set, Language::Rust)
            .await?;
        assert_eq!(outcome.stored, 3);
        assert_eq!(outcome.failed_collections, vec![name("backend_services")?]);
        assert_eq!(backend.collection_info(&ctx, name("rust_code")?).await?.count, 3);

        let attempts = backend
            .upserts
            .lock()
            .map(|upserts| upserts.iter().filter(|name| *name == "backend_services").count())
            .unwrap_or_default();
        assert_eq!(attempts, 2);
        Ok(())
    }

    #[tokio::test]
    async fn every_collection_failing_is_an_error() -> Result<()> {
        let (_backend, manager, set) = setup(&["rust_code", "backend_services"]).await?;
        let result = manager
            .store_chunks(&RequestContext::new_request(), &chunks()?, vectors(3), &set, Language::Rust)
            .await;
        assert!(result.is_err_and(|error| error.code == ErrorCode::dependency_unavailable()));
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_vectors_are_an_invariant_error() -> Result<()> {
        let (_backend, manager, set) = setup(&[]).await?;
        let result = manager
            .store_chunks(&RequestContext::new_request(), &chunks()?, vectors(2), &set, Language::Rust)
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
