//! Natural-language search over one collection.

use crate::embedding_service::EmbeddingService;
use code_ingest_domain::CollectionName;
use code_ingest_ports::{SearchHit, SearchRequest, VectorBackend};
use code_ingest_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;

/// Largest accepted result limit.
pub const MAX_SEARCH_LIMIT: u32 = 100;

/// Embeds a query and runs a nearest-neighbour search.
#[derive(Clone)]
pub struct SearchService {
    embedding: Arc<EmbeddingService>,
    backend: Arc<dyn VectorBackend>,
}

impl SearchService {
    /// Service over an embedding service and a backend.
    #[must_use]
    pub fn new(embedding: Arc<EmbeddingService>, backend: Arc<dyn VectorBackend>) -> Self {
        Self { embedding, backend }
    }

    /// Search `collection` for `query`, best hits first.
    #[tracing::instrument(name = "search", skip_all, fields(collection = %collection, limit = limit))]
    pub async fn search(
        &self,
        ctx: &RequestContext,
        collection: &CollectionName,
        query: &str,
        limit: u32,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "search query must be non-empty",
            ));
        }
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("limit must be between 1 and {MAX_SEARCH_LIMIT}"),
            )
            .with_metadata("limit", limit.to_string()));
        }
        if let Some(threshold) = score_threshold {
            if !threshold.is_finite() {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "score threshold must be finite",
                ));
            }
        }

        let vectors = self.embedding.embed(ctx, vec![Box::from(query)]).await?;
        let Some(vector) = vectors.into_iter().next() else {
            return Err(ErrorEnvelope::unexpected(
                ErrorCode::new("embedding", "count_mismatch"),
                "no vector returned for the query",
                ErrorClass::NonRetriable,
            ));
        };

        let hits = self
            .backend
            .search(
                ctx,
                SearchRequest {
                    collection: collection.clone(),
                    vector: vector.into_vector(),
                    limit,
                    score_threshold,
                },
            )
            .await?;
        tracing::debug!(hits = hits.len(), "search finished");
        Ok(hits)
    }
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SearchService")
            .field("embedding", &self.embedding)
            .field("backend", &self.backend.provider_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding_service::EmbeddingServiceOptions;
    use code_ingest_adapters::{HashedEmbedding, LocalVectorStore};
    use code_ingest_ports::{EmbeddingPort, RecordPayload, VectorRecord};
    use code_ingest_domain::derive_record_id;

    #[tokio::test]
    async fn exact_text_is_the_best_hit() -> Result<()> {
        let ctx = RequestContext::new_request();
        let embedder = Arc::new(HashedEmbedding::new("hashed-v1", 16)?);
        let store = Arc::new(LocalVectorStore::in_memory());
        let collection = CollectionName::parse("rust_code").map_err(ErrorEnvelope::from)?;
        store.create_collection(&ctx, collection.clone(), 16, false).await?;

        let texts = ["fn parse_config()", "struct Retry", "impl Display for Error"];
        let vectors = embedder
            .embed_batch(&ctx, texts.iter().map(|text| Box::from(*text)).collect())
            .await?;
        let records = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(line, (text, vector))| {
                let mut payload = RecordPayload::new();
                payload.insert("content".to_owned(), (*text).into());
                VectorRecord {
                    id: derive_record_id("src/lib.rs", "lib", u32::try_from(line).unwrap_or(0) + 1),
                    vector: vector.into_vector(),
                    payload,
                }
            })
            .collect();
        store.upsert(&ctx, collection.clone(), records).await?;

        let service = SearchService::new(
            Arc::new(EmbeddingService::new(embedder, EmbeddingServiceOptions::default())?),
            store,
        );
        let hits = service.search(&ctx, &collection, "struct Retry", 2, None).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits.first().and_then(|hit| hit.payload.get("content")),
            Some(&serde_json::Value::from("struct Retry"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn blank_queries_and_bad_limits_are_rejected() -> Result<()> {
        let embedder = Arc::new(HashedEmbedding::new("hashed-v1", 4)?);
        let service = SearchService::new(
            Arc::new(EmbeddingService::new(embedder, EmbeddingServiceOptions::default())?),
            Arc::new(LocalVectorStore::in_memory()),
        );
        let ctx = RequestContext::new_request();
        let collection = CollectionName::parse("rust_code").map_err(ErrorEnvelope::from)?;

        assert!(service.search(&ctx, &collection, "  ", 5, None).await.is_err());
        assert!(service.search(&ctx, &collection, "x", 0, None).await.is_err());
        assert!(service.search(&ctx, &collection, "x", 5, Some(f32::NAN)).await.is_err());
        Ok(())
    }
}
