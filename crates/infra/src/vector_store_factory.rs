//! Vector backend selection.

use crate::InfraResult;
use code_ingest_adapters::{LocalVectorStore, QdrantConfig, QdrantVectorStore};
use code_ingest_config::{ValidatedIngestConfig, VectorProviderKind};
use code_ingest_ports::VectorBackend;
use code_ingest_shared::{ErrorCode, ErrorEnvelope};
use std::path::PathBuf;
use std::sync::Arc;

/// Build the vector backend selected by `storage.provider`.
///
/// The local backend persists collections only when `storage.snapshotDir` is set.
pub fn build_vector_backend(config: &ValidatedIngestConfig) -> InfraResult<Arc<dyn VectorBackend>> {
    let storage = &config.storage;
    match storage.provider {
        VectorProviderKind::Local => Ok(storage.snapshot_dir.as_deref().map_or_else(
            || Arc::new(LocalVectorStore::in_memory()) as Arc<dyn VectorBackend>,
            |dir| Arc::new(LocalVectorStore::with_snapshots(PathBuf::from(dir))),
        )),
        VectorProviderKind::Qdrant => {
            let Some(url) = storage.qdrant_url.clone() else {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::new("config", "missing_field"),
                    "storage.qdrantUrl is required for the qdrant provider",
                ));
            };
            let qdrant = QdrantVectorStore::new(&QdrantConfig {
                url,
                api_key: storage.qdrant_api_key.clone(),
                timeout_ms: storage.timeout_ms,
            })?;
            Ok(Arc::new(qdrant))
        },
    }
}
