//! Retry helpers with capped exponential backoff and jitter.
//!
//! Only errors classified [`ErrorClass::Retriable`](crate::ErrorClass) are
//! retried. Backoff sleeps observe request cancellation.

use crate::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try).
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio as percentage (0..=100).
    pub jitter_ratio_pct: u32,
}

impl RetryPolicy {
    /// Exponential policy without jitter: `base, 2*base, 4*base, ..` capped at `max_delay_ms`.
    #[must_use]
    pub const fn exponential(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter_ratio_pct: 0,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn single_attempt() -> Self {
        Self::exponential(1, 0, 0)
    }

    /// Replace the jitter ratio.
    #[must_use]
    pub const fn with_jitter_pct(mut self, jitter_ratio_pct: u32) -> Self {
        self.jitter_ratio_pct = jitter_ratio_pct;
        self
    }

    /// Reject policies that can never run.
    pub fn validate(self) -> Result<Self> {
        if self.max_attempts == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "retry max attempts must be at least 1",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "retry max delay must not be below the base delay",
            )
            .with_metadata("baseDelayMs", self.base_delay_ms.to_string())
            .with_metadata("maxDelayMs", self.max_delay_ms.to_string()));
        }
        Ok(self)
    }

    /// Delay applied after the given failed attempt (1-indexed), before jitter.
    #[must_use]
    pub fn backoff_without_jitter(self, attempt: u32) -> Duration {
        let pow = attempt.saturating_sub(1).min(30);
        let base = self.base_delay_ms.saturating_mul(1u64 << pow);
        Duration::from_millis(base.min(self.max_delay_ms))
    }

    /// Delay applied after the given failed attempt (1-indexed), with jitter.
    #[must_use]
    pub fn backoff(self, attempt: u32) -> Duration {
        let capped = u64::try_from(self.backoff_without_jitter(attempt).as_millis())
            .unwrap_or(self.max_delay_ms);
        let jitter_pct = u64::from(self.jitter_ratio_pct.min(100));
        if jitter_pct == 0 || capped == 0 {
            return Duration::from_millis(capped);
        }
        let jitter_range = capped.saturating_mul(jitter_pct) / 100;
        let spread = jitter_range.saturating_mul(2).saturating_add(1);
        let offset = jitter_seed(attempt) % spread;
        let jittered = capped
            .saturating_sub(jitter_range)
            .saturating_add(offset)
            .min(self.max_delay_ms);
        Duration::from_millis(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, 1_000, 8_000)
    }
}

/// Retry a fallible async operation with backoff + jitter.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_with_observer(ctx, policy, operation, &mut op, |_, _, _| {}).await
}

/// Retry with a callback invoked on each retriable failure.
///
/// The operation receives the 1-indexed attempt number. The observer receives
/// the failed attempt, the error, and the delay before the next attempt.
pub async fn retry_async_with_observer<T, F, Fut, Obs>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    op: &mut F,
    mut on_retry: Obs,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    Obs: FnMut(u32, &ErrorEnvelope, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        ctx.ensure_not_cancelled(operation)?;

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retriable() || attempt >= max_attempts {
                    return Err(error.with_metadata("attempts", attempt.to_string()));
                }

                let delay = policy.backoff(attempt);
                on_retry(attempt, &error, delay);
                sleep_with_cancellation(ctx, delay, operation).await?;
            },
        }
    }
}

fn jitter_seed(attempt: u32) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::from(duration.subsec_nanos()));
    nanos ^ u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

async fn sleep_with_cancellation(
    ctx: &RequestContext,
    delay: Duration,
    operation: &'static str,
) -> Result<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        () = ctx.cancelled() => Err(
            ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
        ),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
