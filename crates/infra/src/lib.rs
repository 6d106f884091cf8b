//! # code-ingest-infra
//!
//! Runtime composition: config to adapters to ingestion services.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Config loading helpers used by CLI surfaces.
pub mod config_check;
/// Embedding adapter selection.
mod embedding_factory;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Service wiring.
pub mod runtime;
/// Vector backend selection.
mod vector_store_factory;

pub use config_check::load_effective_config_json;
pub use embedding_factory::build_embedding_port;
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use runtime::{
    IngestRuntime, embedding_options, extractor_registry, ingestor_options, pipeline_options,
};
pub use vector_store_factory::build_vector_backend;

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]";
                continue;
            }
            if in_deps && line.starts_with("code-ingest-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn infra_depends_on_app_adapters_config() {
        let deps = workspace_deps();
        for expected in ["code-ingest-app", "code-ingest-adapters", "code-ingest-config"] {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn infra_crate_compiles() {
        assert!(!infra_crate_version().is_empty());
    }
}
