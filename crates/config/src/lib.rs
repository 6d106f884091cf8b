//! # code-ingest-config
//!
//! Configuration schema, env overrides, validation, and loading for the
//! ingestion pipeline. This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (file + env).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{EnvParseError, IngestEnv, apply_env_overrides};
pub use load::{load_ingest_config_from_path, load_ingest_config_std_env, to_pretty_json};
pub use schema::{
    CURRENT_CONFIG_VERSION, CheckpointConfig, CollectionsConfig, ConfigSchemaError,
    EmbeddingConfig, EmbeddingProviderKind, IngestConfig, PipelineConfig, RepoEntry,
    StorageConfig, ValidatedIngestConfig, VectorProviderKind, parse_ingest_config_json,
    parse_ingest_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_domain::domain_crate_version;
    use code_ingest_shared::shared_crate_version;

    #[test]
    fn config_crate_compiles() {
        let version = config_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn config_can_use_domain_and_shared() {
        let domain_version = domain_crate_version();
        let shared_version = shared_crate_version();

        assert!(!domain_version.is_empty());
        assert!(!shared_version.is_empty());
    }
}
