//! Environment validation helpers for CLI surfaces.

use code_ingest_config::{IngestConfig, IngestEnv, apply_env_overrides};
use code_ingest_shared::ErrorEnvelope;
use std::collections::BTreeMap;

/// Infra-level error type (shared error envelope).
pub type InfraError = ErrorEnvelope;

/// Infra-level result type.
pub type InfraResult<T> = Result<T, InfraError>;

/// Validate that the provided env overrides parse and merge into a valid config.
pub fn validate_env_parsing(env: &BTreeMap<String, String>) -> InfraResult<()> {
    let parsed = IngestEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let _ = apply_env_overrides(IngestConfig::default(), &parsed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_shared::ErrorCode;

    #[test]
    fn malformed_numbers_are_rejected() {
        let env = BTreeMap::from([("INGEST_BATCH_SIZE".to_owned(), "lots".to_owned())]);
        let error = validate_env_parsing(&env).err();
        assert!(error.is_some_and(|error| error.code != ErrorCode::internal()));
    }

    #[test]
    fn offline_provider_needs_no_api_key() {
        let env = BTreeMap::from([("INGEST_EMBEDDING_PROVIDER".to_owned(), "hashed".to_owned())]);
        assert!(validate_env_parsing(&env).is_ok());
    }

    #[test]
    fn default_provider_requires_an_api_key() {
        assert!(validate_env_parsing(&BTreeMap::new()).is_err());
    }
}
