//! Request-scoped context and a bounded worker pool.
//!
//! - `RequestContext` carries a correlation id and a cancellation token across
//!   every async boundary.
//! - `WorkerPool` runs boxed async jobs on a fixed number of tokio tasks fed
//!   by a bounded channel, so producers feel backpressure once the queue is
//!   full.
//!
//! Cancellation is best-effort: queued jobs are skipped once the context is
//! cancelled, in-flight jobs run to completion unless they observe the token.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// A correlation identifier used for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Parse a correlation identifier from user input.
    ///
    /// The value is trimmed; empty values are rejected.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "correlationId must be non-empty",
            ));
        }
        Ok(Self(Arc::<str>::from(trimmed)))
    }

    /// Create a new request id, unique within this process.
    #[must_use]
    pub fn new_request_id() -> Self {
        next_scoped_id(&REQUEST_ID_COUNTER, "req_")
    }

    /// Create a new ingestion run id, unique within this process.
    #[must_use]
    pub fn new_run_id() -> Self {
        next_scoped_id(&RUN_ID_COUNTER, "run_")
    }

    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_scoped_id(counter: &AtomicU64, prefix: &'static str) -> CorrelationId {
    let n = counter.fetch_add(1, Ordering::Relaxed);
    CorrelationId(Arc::<str>::from(format!("{prefix}{n}")))
}

/// Request-scoped context passed across boundaries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Create a new request context with a fresh cancellation token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Convenience constructor: create a context with an auto-generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::new_request_id())
    }

    /// Convenience constructor: create a context with an auto-generated `run_*` id.
    #[must_use]
    pub fn new_run() -> Self {
        Self::new(CorrelationId::new_run_id())
    }

    /// Return the correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Return a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this request.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Await cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Return a cancellation error when cancelled, including operation metadata.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ErrorEnvelope::cancelled("operation cancelled")
                .with_metadata("operation", operation));
        }
        Ok(())
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Job = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;

/// Options for the worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolOptions {
    /// Number of worker tasks (bounded concurrency).
    pub concurrency: usize,
    /// Backpressure: maximum queued jobs waiting for a worker.
    ///
    /// Default: `concurrency * 2` (minimum 1).
    pub queue_capacity: Option<usize>,
}

impl WorkerPoolOptions {
    /// Options with the given concurrency and the default queue capacity.
    #[must_use]
    pub const fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            queue_capacity: None,
        }
    }
}

/// A bounded worker pool executor.
pub struct WorkerPool {
    ctx: RequestContext,
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a new worker pool bound to the provided `RequestContext`.
    pub fn new(ctx: RequestContext, options: WorkerPoolOptions) -> Result<Self> {
        if options.concurrency == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "concurrency must be a positive number",
            ));
        }

        let capacity = options
            .queue_capacity
            .unwrap_or_else(|| options.concurrency.saturating_mul(2))
            .max(1);
        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..options.concurrency)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                let ctx = ctx.clone();
                tokio::spawn(worker_loop(receiver, ctx))
            })
            .collect();

        Ok(Self {
            ctx,
            sender: Some(sender),
            workers,
        })
    }

    /// Enqueue a job without waiting for its result.
    ///
    /// Waits for queue capacity when every worker is busy and the queue is full.
    pub async fn spawn<Fut, F>(&self, job: F) -> Result<()>
    where
        Fut: Future<Output = ()> + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
    {
        self.ctx.ensure_not_cancelled("worker_pool.spawn")?;
        let sender = self.sender.as_ref().ok_or_else(pool_closed)?;
        let boxed: Job = Box::new(move || Box::pin(job()));

        tokio::select! {
            () = self.ctx.cancelled() => Err(
                ErrorEnvelope::cancelled("operation cancelled")
                    .with_metadata("operation", "worker_pool.spawn")
            ),
            sent = sender.send(boxed) => sent.map_err(|_| pool_closed()),
        }
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            if let Err(join_error) = handle.await {
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    format!("worker task failed: {join_error}"),
                    ErrorClass::NonRetriable,
                ));
            }
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in &self.workers {
            handle.abort();
        }
    }
}

fn pool_closed() -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("core", "worker_pool_closed"),
        "worker pool is closed",
    )
}

async fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<Job>>>, ctx: RequestContext) {
    loop {
        let job = {
            let mut guard = receiver.lock().await;
            tokio::select! {
                () = ctx.cancelled() => None,
                job = guard.recv() => job,
            }
        };

        let Some(job) = job else {
            return;
        };
        if ctx.is_cancelled() {
            return;
        }
        job().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn worker_pool_bounds_concurrency() -> Result<()> {
        let pool = WorkerPool::new(
            RequestContext::new_request(),
            WorkerPoolOptions::with_concurrency(2),
        )?;
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

        for _ in 0..8 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let done_tx = done_tx.clone();
            pool.spawn(move || async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .await?;
        }

        for _ in 0..8 {
            done_rx.recv().await;
        }
        pool.shutdown().await?;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_pool_rejects_new_jobs() -> Result<()> {
        let ctx = RequestContext::new_request();
        let pool = WorkerPool::new(ctx.clone(), WorkerPoolOptions::with_concurrency(1))?;
        ctx.cancel();
        let result = pool.spawn(|| async {}).await;
        assert!(result.is_err_and(|error| error.is_cancelled()));
        Ok(())
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let runtime = tokio::runtime::Builder::new_current_thread().build();
        let Ok(runtime) = runtime else {
            return;
        };
        runtime.block_on(async {
            let result = WorkerPool::new(
                RequestContext::new_request(),
                WorkerPoolOptions::with_concurrency(0),
            );
            assert!(result.is_err());
        });
    }
}
