//! Parallel batch execution with bounded per-batch retries.

use super::state::{BatchEvent, BatchState};
use super::{PipelineOptions, RoutedChunk, StreamOutcome};
use crate::embedding_service::EmbeddingService;
use crate::storage::StorageManager;
use code_ingest_domain::{CodeChunk, CollectionName, CollectionSet, Language};
use code_ingest_ports::EmbeddingVector;
use code_ingest_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, WorkerPool, WorkerPoolOptions,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of one attempt, sent from a worker back to the dispatcher.
#[derive(Debug)]
struct AttemptReport {
    batch_id: usize,
    attempt: u32,
    oversized: usize,
    eligible: usize,
    result: Result<AttemptTally>,
}

/// Chunks stored by one successful attempt.
#[derive(Debug, Default)]
struct AttemptTally {
    stored: usize,
    by_collection: BTreeMap<CollectionName, usize>,
}

struct BatchSlot {
    chunks: Arc<[RoutedChunk]>,
    state: BatchState,
}

/// Embeds and stores chunks in parallel batches.
///
/// Each batch runs through [`BatchState`]; workers report attempt results over
/// a channel and only the dispatcher mutates batch state. A batch that
/// exhausts its attempts is counted as lost without blocking the others.
#[derive(Clone)]
pub struct BatchProcessor {
    embedding: Arc<EmbeddingService>,
    storage: Arc<StorageManager>,
    options: PipelineOptions,
}

impl BatchProcessor {
    /// Build a processor; rejects zero sizes.
    pub fn new(
        embedding: Arc<EmbeddingService>,
        storage: Arc<StorageManager>,
        options: PipelineOptions,
    ) -> Result<Self> {
        Ok(Self {
            embedding,
            storage,
            options: options.validate()?,
        })
    }

    /// Pipeline options in effect.
    #[must_use]
    pub const fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Embed and store `chunks`, every one into the same `collections`.
    pub async fn stream_to_storage(
        &self,
        ctx: &RequestContext,
        chunks: Vec<CodeChunk>,
        collections: &CollectionSet,
        language: Language,
    ) -> Result<StreamOutcome> {
        let routed = chunks
            .into_iter()
            .map(|chunk| RoutedChunk {
                chunk,
                collections: collections.clone(),
            })
            .collect();
        self.stream_routed(ctx, routed, language).await
    }

    /// Embed and store chunks that each carry their own collection set.
    #[tracing::instrument(
        name = "pipeline.stream",
        skip_all,
        fields(language = %language, chunks = routed.len())
    )]
    pub async fn stream_routed(
        &self,
        ctx: &RequestContext,
        routed: Vec<RoutedChunk>,
        language: Language,
    ) -> Result<StreamOutcome> {
        if routed.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "cannot stream an empty chunk list",
            ));
        }

        let mut slots = self.partition(routed);
        let max_attempts = self.options.max_retries;
        let mut outcome = StreamOutcome {
            batches: slots.len(),
            ..StreamOutcome::default()
        };

        let pool = WorkerPool::new(
            ctx.clone(),
            WorkerPoolOptions::with_concurrency(self.options.max_workers),
        )?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<AttemptReport>();

        let mut in_flight = 0usize;
        for batch_id in 0..slots.len() {
            self.dispatch(ctx, &pool, &sender, &mut slots, batch_id, language, max_attempts)
                .await?;
            in_flight += 1;
        }

        while in_flight > 0 {
            let report = tokio::select! {
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled("operation cancelled")
                        .with_metadata("operation", "pipeline.stream"));
                },
                report = receiver.recv() => report,
            };
            let Some(report) = report else {
                return Err(ErrorEnvelope::invariant(
                    ErrorCode::new("pipeline", "outcome_channel_closed"),
                    "batch outcome channel closed with batches in flight",
                ));
            };
            in_flight -= 1;
            outcome.attempts += 1;

            if report.attempt == 1 && report.oversized > 0 {
                outcome.oversized += report.oversized;
                tracing::warn!(
                    batch_id = report.batch_id,
                    oversized = report.oversized,
                    max_chunk_chars = self.options.max_chunk_chars,
                    "oversized chunks skipped"
                );
            }

            let Some(slot) = slots.get_mut(report.batch_id) else {
                return Err(unknown_batch(report.batch_id));
            };
            let event = match &report.result {
                Ok(tally) => BatchEvent::Succeeded { count: tally.stored },
                Err(error) if error.is_cancelled() => return Err(error.clone()),
                Err(_) => BatchEvent::Failed,
            };
            let state = slot.state.transition(event, max_attempts)?;
            slot.state = state;

            match state {
                BatchState::Stored { count } => {
                    outcome.stored += count;
                    if let Ok(tally) = &report.result {
                        for (name, stored) in &tally.by_collection {
                            *outcome.stored_by_collection.entry(name.clone()).or_default() += stored;
                        }
                    }
                    tracing::debug!(batch_id = report.batch_id, attempt = report.attempt, chunks = count, "batch stored");
                },
                BatchState::RetryScheduled { next_attempt } => {
                    if let Err(error) = &report.result {
                        tracing::warn!(
                            batch_id = report.batch_id,
                            attempt = report.attempt,
                            next_attempt,
                            code = %error.code,
                            error = %error.message,
                            "batch attempt failed, retrying"
                        );
                    }
                    self.dispatch(ctx, &pool, &sender, &mut slots, report.batch_id, language, max_attempts)
                        .await?;
                    in_flight += 1;
                },
                BatchState::PermanentlyFailed { attempts } => {
                    outcome.lost += report.eligible;
                    outcome.failed_batches.push(report.batch_id);
                    let (code, message) = report.result.as_ref().err().map_or_else(
                        || (String::new(), String::new()),
                        |error| (error.code.to_string(), error.message.clone()),
                    );
                    tracing::error!(
                        batch_id = report.batch_id,
                        attempts,
                        lost = report.eligible,
                        code = %code,
                        error = %message,
                        "batch permanently failed"
                    );
                },
                BatchState::Pending | BatchState::InFlight { .. } => {
                    return Err(ErrorEnvelope::invariant(
                        ErrorCode::new("pipeline", "illegal_transition"),
                        format!("batch {} left in state {state}", report.batch_id),
                    ));
                },
            }
        }

        if let Some((batch_id, slot)) = slots
            .iter()
            .enumerate()
            .find(|(_, slot)| !slot.state.is_terminal())
        {
            return Err(ErrorEnvelope::invariant(
                ErrorCode::new("pipeline", "illegal_transition"),
                format!("batch {batch_id} left in state {}", slot.state),
            ));
        }

        drop(sender);
        pool.shutdown().await?;
        outcome.failed_batches.sort_unstable();
        tracing::info!(
            stored = outcome.stored,
            lost = outcome.lost,
            oversized = outcome.oversized,
            batches = outcome.batches,
            attempts = outcome.attempts,
            "stream finished"
        );
        Ok(outcome)
    }

    fn partition(&self, routed: Vec<RoutedChunk>) -> Vec<BatchSlot> {
        let mut slots = Vec::with_capacity(routed.len().div_ceil(self.options.batch_size));
        let mut current = Vec::with_capacity(self.options.batch_size);
        for chunk in routed {
            current.push(chunk);
            if current.len() == self.options.batch_size {
                slots.push(BatchSlot {
                    chunks: Arc::from(std::mem::take(&mut current)),
                    state: BatchState::Pending,
                });
            }
        }
        if !current.is_empty() {
            slots.push(BatchSlot {
                chunks: Arc::from(current),
                state: BatchState::Pending,
            });
        }
        slots
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        pool: &WorkerPool,
        sender: &mpsc::UnboundedSender<AttemptReport>,
        slots: &mut [BatchSlot],
        batch_id: usize,
        language: Language,
        max_attempts: u32,
    ) -> Result<()> {
        let Some(slot) = slots.get_mut(batch_id) else {
            return Err(unknown_batch(batch_id));
        };
        slot.state = slot.state.transition(BatchEvent::Dispatched, max_attempts)?;
        let BatchState::InFlight { attempt } = slot.state else {
            return Err(unknown_batch(batch_id));
        };

        let chunks = Arc::clone(&slot.chunks);
        let embedding = Arc::clone(&self.embedding);
        let storage = Arc::clone(&self.storage);
        let sender = sender.clone();
        let ctx = ctx.clone();
        let max_chunk_chars = self.options.max_chunk_chars;

        pool.spawn(move || async move {
            let eligible: Vec<&RoutedChunk> = chunks
                .iter()
                .filter(|routed| routed.chunk.content_chars() <= max_chunk_chars)
                .collect();
            let oversized = chunks.len() - eligible.len();
            let eligible_count = eligible.len();
            let result = run_attempt(&ctx, &embedding, &storage, &eligible, language).await;
            let report = AttemptReport {
                batch_id,
                attempt,
                oversized,
                eligible: eligible_count,
                result,
            };
            if sender.send(report).is_err() {
                // Dispatcher gone; the stream was abandoned.
            }
        })
        .await
    }
}

async fn run_attempt(
    ctx: &RequestContext,
    embedding: &EmbeddingService,
    storage: &StorageManager,
    eligible: &[&RoutedChunk],
    language: Language,
) -> Result<AttemptTally> {
    if eligible.is_empty() {
        return Ok(AttemptTally::default());
    }

    let texts: Vec<Box<str>> = eligible
        .iter()
        .map(|routed| Box::from(routed.chunk.content()))
        .collect();
    let vectors = embedding.embed(ctx, texts).await?;
    if vectors.len() != eligible.len() {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::new("embedding", "count_mismatch"),
            "embedding count does not match chunk count",
            ErrorClass::NonRetriable,
        ));
    }

    let mut groups: BTreeMap<&CollectionSet, (Vec<CodeChunk>, Vec<EmbeddingVector>)> =
        BTreeMap::new();
    for (routed, vector) in eligible.iter().zip(vectors) {
        let (chunks, vectors) = groups.entry(&routed.collections).or_default();
        chunks.push(routed.chunk.clone());
        vectors.push(vector);
    }

    let mut tally = AttemptTally::default();
    for (collections, (chunks, vectors)) in groups {
        let outcome = storage
            .store_chunks(ctx, &chunks, vectors, collections, language)
            .await?;
        tally.stored += outcome.stored;
        for name in outcome.stored_collections {
            *tally.by_collection.entry(name).or_default() += outcome.stored;
        }
    }
    Ok(tally)
}

fn unknown_batch(batch_id: usize) -> ErrorEnvelope {
    ErrorEnvelope::invariant(
        ErrorCode::new("pipeline", "unknown_batch"),
        format!("no batch with id {batch_id}"),
    )
}
