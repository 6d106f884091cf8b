//! Integration tests for file loading and env-to-config merging.

use code_ingest_config::{
    EmbeddingProviderKind, IngestEnv, VectorProviderKind, load_ingest_config_from_path,
    to_pretty_json,
};
use code_ingest_domain::{Concern, Language, RepoId, RepoType, ServiceBucket};
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;

const CONFIG_TOML: &str = r#"
version = 1

[embedding]
provider = "openai"
model = "text-embedding-3-large"
dimension = 3072
rateLimit = 4

[pipeline]
batchSize = 50
maxWorkers = 2

[storage]
provider = "qdrant"
qdrantUrl = "http://localhost:6333"

[collections.languages]
rust = "rs_chunks"

[collections.concerns]
deployment = "helm_and_k8s"

[[repos]]
repoId = "payments-api"
repoType = "backend"
root = "/src/payments-api"
languages = ["rust", "yaml", "rust"]
hasHelm = true
businessDomain = " payments "
"#;

fn env_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[test]
fn toml_file_merges_with_env_overrides() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ingest.toml");
    fs::write(&path, CONFIG_TOML)?;

    let env = IngestEnv::from_map(&env_map(&[
        ("INGEST_EMBEDDING_API_KEY", "sk-test"),
        ("INGEST_MAX_WORKERS", "8"),
    ]))?;
    let config = load_ingest_config_from_path(Some(&path), &env)?;

    assert_eq!(config.embedding.provider, EmbeddingProviderKind::OpenAi);
    assert_eq!(config.embedding.dimension, 3072);
    assert_eq!(config.embedding.rate_limit, 4);
    assert_eq!(config.pipeline.batch_size, 50);
    assert_eq!(config.pipeline.max_workers, 8);
    assert_eq!(config.storage.provider, VectorProviderKind::Qdrant);

    assert_eq!(config.layout().language(Language::Rust).as_str(), "rs_chunks");
    assert_eq!(
        config.layout().language(Language::Yaml).as_str(),
        "yaml_configs"
    );
    assert_eq!(
        config.layout().concern(Concern::Deployment).as_str(),
        "helm_and_k8s"
    );
    assert_eq!(
        config.layout().service(ServiceBucket::Backend).as_str(),
        "backend_services"
    );

    let [repo] = config.repos() else {
        return Err("expected exactly one repo".into());
    };
    assert_eq!(repo.repo_type, RepoType::Backend);
    assert_eq!(repo.languages, vec![Language::Rust, Language::Yaml]);
    assert!(repo.has_helm);
    assert_eq!(repo.business_domain.as_deref(), Some("payments"));
    assert_eq!(
        config.repo_root(&RepoId::parse("payments-api")?),
        Some("/src/payments-api")
    );
    Ok(())
}

#[test]
fn env_can_switch_to_the_offline_provider() -> Result<(), Box<dyn Error>> {
    let env = IngestEnv::from_map(&env_map(&[
        ("INGEST_EMBEDDING_PROVIDER", "hashed"),
        ("INGEST_EMBEDDING_DIMENSION", "64"),
        ("INGEST_CHECKPOINT_PATH", "/tmp/ingest/checkpoint.json"),
    ]))?;
    let config = load_ingest_config_from_path(None, &env)?;

    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashed);
    assert_eq!(config.embedding.dimension, 64);
    assert_eq!(config.checkpoint.path.as_ref(), "/tmp/ingest/checkpoint.json");
    Ok(())
}

#[test]
fn missing_api_key_fails_validation() -> Result<(), Box<dyn Error>> {
    let result = load_ingest_config_from_path(None, &IngestEnv::default());
    let Err(error) = result else {
        return Err("openai provider without a key must not validate".into());
    };
    assert_eq!(error.code.to_string(), "config:missing_field");
    assert_eq!(
        error.metadata.get("field").map(String::as_str),
        Some("apiKey")
    );
    Ok(())
}

#[test]
fn pretty_json_never_contains_secrets() -> Result<(), Box<dyn Error>> {
    let env = IngestEnv::from_map(&env_map(&[
        ("INGEST_EMBEDDING_API_KEY", "sk-very-secret"),
        ("INGEST_STORAGE_PROVIDER", "qdrant"),
        ("INGEST_QDRANT_URL", "https://qdrant.internal:6333"),
        ("INGEST_QDRANT_API_KEY", "qdrant-secret"),
    ]))?;
    let config = load_ingest_config_from_path(None, &env)?;
    let rendered = to_pretty_json(&config)?;

    assert!(rendered.ends_with('\n'));
    assert!(!rendered.contains("sk-very-secret"));
    assert!(!rendered.contains("qdrant-secret"));
    assert!(rendered.contains("\"qdrantUrl\": \"https://qdrant.internal:6333\""));
    Ok(())
}

#[test]
fn zero_workers_from_env_is_rejected() -> Result<(), Box<dyn Error>> {
    let env = IngestEnv::from_map(&env_map(&[
        ("INGEST_EMBEDDING_PROVIDER", "hashed"),
        ("INGEST_MAX_WORKERS", "0"),
    ]))?;
    let result = load_ingest_config_from_path(None, &env);
    assert!(result.is_err_and(|error| {
        error.code.to_string() == "config:invalid_limit"
            && error.metadata.get("field").map(String::as_str) == Some("maxWorkers")
    }));
    Ok(())
}
