//! Checkpoint persistence boundary contract.

use crate::BoxFuture;
use code_ingest_domain::Checkpoint;
use code_ingest_shared::Result;

/// Stores the single in-flight checkpoint.
///
/// Callers decide how to degrade on failure; stores report every error.
pub trait CheckpointStore: Send + Sync {
    /// Load the stored checkpoint, or `None` when nothing is stored.
    fn load(&self) -> BoxFuture<'_, Result<Option<Checkpoint>>>;

    /// Replace the stored checkpoint.
    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<()>>;

    /// Remove the stored checkpoint; succeeds when nothing is stored.
    fn clear(&self) -> BoxFuture<'_, Result<()>>;
}
