//! # code-ingest-shared
//!
//! Foundational types used by every other crate in the code-ingest workspace:
//!
//! - Result alias and the structured [`ErrorEnvelope`]
//! - Retry policy with capped exponential backoff
//! - Per-call deadlines that observe cancellation
//! - Request context and a bounded worker pool
//! - Secret redaction
//!
//! This crate has no workspace dependencies.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod redaction;
pub mod result;
pub mod retry;
pub mod timeout;

pub use concurrency::{CorrelationId, RequestContext, WorkerPool, WorkerPoolOptions};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use redaction::{REDACTED, SecretString, is_secret_key, redact_if_secret};
pub use result::{Result, ResultExt};
pub use retry::{RetryPolicy, retry_async, retry_async_with_observer};
pub use timeout::timeout_with_context;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
