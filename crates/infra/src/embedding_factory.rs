//! Embedding adapter selection.

use crate::InfraResult;
use code_ingest_adapters::{HashedEmbedding, OpenAiEmbedding, OpenAiEmbeddingConfig};
use code_ingest_config::{EmbeddingProviderKind, ValidatedIngestConfig};
use code_ingest_ports::EmbeddingPort;
use code_ingest_shared::{ErrorCode, ErrorEnvelope};
use std::sync::Arc;

/// Build the embedding port selected by `embedding.provider`.
pub fn build_embedding_port(config: &ValidatedIngestConfig) -> InfraResult<Arc<dyn EmbeddingPort>> {
    let embedding = &config.embedding;
    let port: Arc<dyn EmbeddingPort> = match embedding.provider {
        EmbeddingProviderKind::OpenAi => {
            let Some(api_key) = embedding.api_key.clone() else {
                return Err(ErrorEnvelope::expected(
                    ErrorCode::new("config", "missing_api_key"),
                    "OpenAI API key is required; set embedding.apiKey or INGEST_EMBEDDING_API_KEY",
                ));
            };
            let adapter_config = OpenAiEmbeddingConfig::from_embedding_config(api_key, embedding);
            Arc::new(OpenAiEmbedding::new(&adapter_config)?)
        },
        EmbeddingProviderKind::Hashed => {
            Arc::new(HashedEmbedding::new(embedding.model.clone(), embedding.dimension)?)
        },
    };
    tracing::debug!(
        provider = embedding.provider.as_str(),
        model = %embedding.model,
        dimension = embedding.dimension,
        "embedding port ready"
    );
    Ok(port)
}
