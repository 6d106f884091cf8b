//! Deterministic embedding adapter for offline runs and tests.

use code_ingest_ports::{BoxFuture, EmbeddingPort, EmbeddingProviderInfo, EmbeddingVector};
use code_ingest_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use sha2::{Digest, Sha256};

/// Embeds text as unit vectors expanded from sha-256 digests.
///
/// Identical texts always produce identical vectors, so exact-match search
/// works without a network provider.
#[derive(Debug, Clone)]
pub struct HashedEmbedding {
    provider: EmbeddingProviderInfo,
    dimension: usize,
}

impl HashedEmbedding {
    /// Build a hashed embedder with a fixed dimension.
    pub fn new(model: impl Into<Box<str>>, dimension: u32) -> Result<Self> {
        if dimension == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "embedding dimension must be positive",
            ));
        }
        let size = usize::try_from(dimension).map_err(|_| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                "embedding dimension overflow",
                ErrorClass::NonRetriable,
            )
        })?;
        Ok(Self {
            provider: EmbeddingProviderInfo {
                id: "hashed".into(),
                model: model.into(),
                dimension,
            },
            dimension: size,
        })
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut counter = 0u64;

        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(b":");
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest {
                vector.push(f32::from(byte) / 127.5 - 1.0);
                if vector.len() == self.dimension {
                    break;
                }
            }
            counter = counter.saturating_add(1);
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl EmbeddingPort for HashedEmbedding {
    fn provider(&self) -> &EmbeddingProviderInfo {
        &self.provider
    }

    fn embed_batch(
        &self,
        ctx: &RequestContext,
        texts: Vec<Box<str>>,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("hashed_embedding.embed_batch")?;
            Ok(texts
                .iter()
                .map(|text| EmbeddingVector::from_vec(self.vector_for(text)))
                .collect())
        })
    }
}
