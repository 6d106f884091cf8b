//! Embedding boundary contract.

use crate::BoxFuture;
use code_ingest_shared::{RequestContext, Result};
use std::sync::Arc;

/// An embedding vector payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    vector: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Build an embedding vector from a shared slice.
    #[must_use]
    pub const fn new(vector: Arc<[f32]>) -> Self {
        Self { vector }
    }

    /// Build an embedding vector from an owned vector.
    #[must_use]
    pub fn from_vec(vector: Vec<f32>) -> Self {
        Self::new(Arc::from(vector))
    }

    /// Borrow the vector as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Borrow the shared vector buffer.
    #[must_use]
    pub const fn vector(&self) -> &Arc<[f32]> {
        &self.vector
    }

    /// Number of elements.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Returns true when every element is finite (no NaN, no infinity).
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.vector.iter().all(|value| value.is_finite())
    }

    /// Consume and return the shared vector buffer.
    #[must_use]
    pub fn into_vector(self) -> Arc<[f32]> {
        self.vector
    }
}

/// Provider descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingProviderInfo {
    /// Stable provider identifier (`openai`, `hashed`, ...).
    pub id: Box<str>,
    /// Model name sent to the provider and recorded in payloads.
    pub model: Box<str>,
    /// Expected vector dimension.
    pub dimension: u32,
}

/// Boundary contract for embedding generation.
///
/// Implementations make exactly one provider call per `embed_batch` and do not
/// retry; retry, rate limiting and validation belong to the caller.
pub trait EmbeddingPort: Send + Sync {
    /// Provider info for this implementation.
    fn provider(&self) -> &EmbeddingProviderInfo;

    /// Embed multiple texts in one provider call, preserving input order.
    fn embed_batch(
        &self,
        ctx: &RequestContext,
        texts: Vec<Box<str>>,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finiteness_check_rejects_nan_and_infinity() {
        assert!(EmbeddingVector::from_vec(vec![0.0, 1.5]).is_finite());
        assert!(!EmbeddingVector::from_vec(vec![0.0, f32::NAN]).is_finite());
        assert!(!EmbeddingVector::from_vec(vec![f32::INFINITY]).is_finite());
    }
}
