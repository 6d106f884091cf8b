//! Batch partitioning, scheduling and retry.

mod processor;
mod state;

pub use processor::BatchProcessor;
pub use state::{BatchEvent, BatchState};

use code_ingest_domain::{CodeChunk, CollectionName, CollectionSet};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sizing of the batch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Chunks per batch.
    pub batch_size: usize,
    /// Batches executed concurrently.
    pub max_workers: usize,
    /// Attempts per batch, including the first.
    pub max_retries: u32,
    /// Chunks longer than this many characters are skipped.
    pub max_chunk_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 4,
            max_retries: 3,
            max_chunk_chars: 24_000,
        }
    }
}

impl PipelineOptions {
    /// Reject sizes that would stall the pipeline.
    pub fn validate(self) -> Result<Self> {
        let checks = [
            ("batch_size", self.batch_size == 0),
            ("max_workers", self.max_workers == 0),
            ("max_retries", self.max_retries == 0),
            ("max_chunk_chars", self.max_chunk_chars == 0),
        ];
        for (field, zero) in checks {
            if zero {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    format!("{field} must be greater than zero"),
                )
                .with_metadata("field", field));
            }
        }
        Ok(self)
    }
}

/// A chunk paired with the collections it is stored into.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedChunk {
    /// The chunk.
    pub chunk: CodeChunk,
    /// Target collections.
    pub collections: CollectionSet,
}

/// Totals of one streaming run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamOutcome {
    /// Chunks stored into at least one collection.
    pub stored: usize,
    /// Chunks of permanently failed batches.
    pub lost: usize,
    /// Chunks skipped for exceeding the size limit.
    pub oversized: usize,
    /// Batches the input was split into.
    pub batches: usize,
    /// Attempts made across every batch.
    pub attempts: usize,
    /// Ids of permanently failed batches, ascending.
    pub failed_batches: Vec<usize>,
    /// Chunks of stored batches accepted by each collection.
    pub stored_by_collection: BTreeMap<CollectionName, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_rejected() {
        let base = PipelineOptions::default();
        for options in [
            PipelineOptions { batch_size: 0, ..base },
            PipelineOptions { max_workers: 0, ..base },
            PipelineOptions { max_retries: 0, ..base },
            PipelineOptions { max_chunk_chars: 0, ..base },
        ] {
            assert!(options.validate().is_err());
        }
        assert!(base.validate().is_ok());
    }
}
