//! Rate-limited, retried and validated batch embedding.

use code_ingest_ports::{EmbeddingPort, EmbeddingProviderInfo, EmbeddingVector};
use code_ingest_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy,
    retry_async_with_observer, timeout_with_context,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

const OPERATION: &str = "embedding_service.embed";

/// Tuning for [`EmbeddingService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingServiceOptions {
    /// Concurrent provider calls allowed across every worker.
    pub rate_limit: usize,
    /// Deadline of one provider call.
    pub timeout: Duration,
    /// Retry policy for retriable provider failures.
    pub retry: RetryPolicy,
}

impl Default for EmbeddingServiceOptions {
    fn default() -> Self {
        Self {
            rate_limit: 8,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::exponential(3, 1_000, 30_000).with_jitter_pct(10),
        }
    }
}

/// Wraps an [`EmbeddingPort`] with a shared rate limit, per-call deadline,
/// retry with backoff and vector validation.
///
/// The permit is held only for the duration of one provider call, so a
/// batch that is backing off does not block other workers.
pub struct EmbeddingService {
    port: Arc<dyn EmbeddingPort>,
    permits: Semaphore,
    timeout: Duration,
    retry: RetryPolicy,
}

impl EmbeddingService {
    /// Build a service over `port`.
    pub fn new(port: Arc<dyn EmbeddingPort>, options: EmbeddingServiceOptions) -> Result<Self> {
        if options.rate_limit == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "rate_limit must be greater than zero",
            ));
        }
        if options.timeout.is_zero() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "embedding timeout must be greater than zero",
            ));
        }
        if port.provider().dimension == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "embedding dimension must be greater than zero",
            ));
        }
        let retry = options.retry.validate()?;
        Ok(Self {
            port,
            permits: Semaphore::new(options.rate_limit),
            timeout: options.timeout,
            retry,
        })
    }

    /// Provider identity and configured dimension.
    #[must_use]
    pub fn provider(&self) -> &EmbeddingProviderInfo {
        self.port.provider()
    }

    /// Configured vector dimension.
    #[must_use]
    pub fn dimension(&self) -> u32 {
        self.port.provider().dimension
    }

    /// Embed `texts`, returning one validated vector per input, in order.
    ///
    /// No partial result is ever returned: a wrong count, a wrong length or a
    /// non-finite value anywhere rejects the whole call.
    pub async fn embed(
        &self,
        ctx: &RequestContext,
        texts: Vec<Box<str>>,
    ) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();

        let mut call = |attempt: u32| {
            let texts = texts.clone();
            async move {
                let _permit = self.acquire(ctx).await?;
                tracing::trace!(attempt, texts = texts.len(), "embedding call");
                timeout_with_context(ctx, self.timeout, OPERATION, self.port.embed_batch(ctx, texts))
                    .await
            }
        };
        let vectors = retry_async_with_observer(
            ctx,
            self.retry,
            OPERATION,
            &mut call,
            |attempt, error, delay| {
                tracing::warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    code = %error.code,
                    "embedding call failed, retrying"
                );
            },
        )
        .await?;

        self.validate(expected, vectors)
    }

    async fn acquire(&self, ctx: &RequestContext) -> Result<SemaphorePermit<'_>> {
        tokio::select! {
            () = ctx.cancelled() => Err(
                ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", OPERATION)
            ),
            permit = self.permits.acquire() => permit.map_err(|_| {
                ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    "embedding rate limiter closed",
                    ErrorClass::NonRetriable,
                )
            }),
        }
    }

    fn validate(
        &self,
        expected: usize,
        vectors: Vec<EmbeddingVector>,
    ) -> Result<Vec<EmbeddingVector>> {
        if vectors.len() != expected {
            return Err(ErrorEnvelope::unexpected(
                ErrorCode::new("embedding", "count_mismatch"),
                format!("expected {expected} vectors, got {}", vectors.len()),
                ErrorClass::NonRetriable,
            )
            .with_metadata("expected", expected.to_string())
            .with_metadata("actual", vectors.len().to_string()));
        }

        let dimension = usize::try_from(self.dimension()).unwrap_or(usize::MAX);
        for (index, vector) in vectors.iter().enumerate() {
            if vector.dimension() != dimension || !vector.is_finite() {
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::new("embedding", "invalid_vector"),
                    format!("vector {index} is not a finite vector of length {dimension}"),
                    ErrorClass::NonRetriable,
                )
                .with_metadata("index", index.to_string())
                .with_metadata("dimension", vector.dimension().to_string()));
            }
        }
        Ok(vectors)
    }
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EmbeddingService")
            .field("provider", self.port.provider())
            .field("available_permits", &self.permits.available_permits())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
