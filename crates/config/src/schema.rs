//! Ingestion configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Normalization trims strings and de-duplicates list fields.

use code_ingest_domain::{
    CollectionLayout, CollectionName, Concern, Language, Priority, RepoConfig, RepoId, RepoType,
    ServiceBucket,
};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, RetryPolicy, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use url::Url;

/// Sanitizes a URL for error messages by stripping credentials.
fn sanitize_url_for_error(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() || !parsed.username().is_empty() {
                if parsed.set_username("").is_err() {
                    return "[invalid url: invalid username]".to_string();
                }
                if parsed.set_password(None).is_err() {
                    return "[invalid url: invalid password]".to_string();
                }
            }
            parsed.to_string()
        },
        Err(error) => format!("[invalid url: {error}]"),
    }
}

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const EMBEDDING_DIMENSION_MIN: u32 = 1;
const EMBEDDING_DIMENSION_MAX: u32 = 65_536;
const EMBEDDING_TIMEOUT_MIN_MS: u64 = 1_000;
const EMBEDDING_TIMEOUT_MAX_MS: u64 = 600_000;
const EMBEDDING_RATE_LIMIT_MIN: u32 = 1;
const EMBEDDING_RATE_LIMIT_MAX: u32 = 256;

const RETRY_MAX_ATTEMPTS_MIN: u32 = 1;
const RETRY_MAX_ATTEMPTS_MAX: u32 = 10;
const RETRY_BASE_DELAY_MIN_MS: u64 = 1;
const RETRY_BASE_DELAY_MAX_MS: u64 = 60_000;
const RETRY_MAX_DELAY_MIN_MS: u64 = 1;
const RETRY_MAX_DELAY_MAX_MS: u64 = 600_000;
const RETRY_JITTER_PCT_MAX: u32 = 100;

const PIPELINE_BATCH_SIZE_MIN: u32 = 1;
const PIPELINE_BATCH_SIZE_MAX: u32 = 2_048;
const PIPELINE_MAX_WORKERS_MIN: u32 = 1;
const PIPELINE_MAX_WORKERS_MAX: u32 = 64;
const PIPELINE_MAX_CHUNK_CHARS_MIN: u32 = 1;
const PIPELINE_MAX_CHUNK_CHARS_MAX: u32 = 200_000;
const PIPELINE_CHECKPOINT_EVERY_MIN: u32 = 1;
const PIPELINE_CHECKPOINT_EVERY_MAX: u32 = 100_000;

const STORAGE_TIMEOUT_MIN_MS: u64 = 1_000;
const STORAGE_TIMEOUT_MAX_MS: u64 = 600_000;

/// Top-level ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct IngestConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Batch pipeline settings.
    pub pipeline: PipelineConfig,
    /// Vector store settings.
    pub storage: StorageConfig,
    /// Collection name overrides.
    pub collections: CollectionsConfig,
    /// Checkpoint file settings.
    pub checkpoint: CheckpointConfig,
    /// Repositories to ingest.
    pub repos: Vec<RepoEntry>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            embedding: EmbeddingConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            collections: CollectionsConfig::default(),
            checkpoint: CheckpointConfig::default(),
            repos: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Validate and normalize the config.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedIngestConfig, ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }

        self.embedding.normalize();
        self.embedding.validate()?;
        self.pipeline.validate()?;
        self.storage.normalize();
        self.storage.validate()?;
        let layout = self.collections.to_layout()?;
        self.checkpoint.normalize();
        self.checkpoint.validate()?;

        let mut repos = Vec::with_capacity(self.repos.len());
        let mut seen = BTreeSet::new();
        for entry in &mut self.repos {
            entry.normalize();
            let repo = entry.to_repo_config()?;
            if !seen.insert(repo.repo_id.clone()) {
                return Err(ConfigSchemaError::DuplicateRepo {
                    repo_id: repo.repo_id.as_str().to_owned(),
                });
            }
            repos.push(repo);
        }

        Ok(ValidatedIngestConfig {
            raw: self,
            layout,
            repos,
        })
    }
}

/// Validated configuration wrapper with derived domain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIngestConfig {
    raw: IngestConfig,
    layout: CollectionLayout,
    repos: Vec<RepoConfig>,
}

impl ValidatedIngestConfig {
    /// Collection layout with overrides applied.
    #[must_use]
    pub const fn layout(&self) -> &CollectionLayout {
        &self.layout
    }

    /// Repository classifications, in config order.
    #[must_use]
    pub fn repos(&self) -> &[RepoConfig] {
        &self.repos
    }

    /// Source root for a repository, if it is configured.
    #[must_use]
    pub fn repo_root(&self, repo_id: &RepoId) -> Option<&str> {
        self.raw
            .repos
            .iter()
            .find(|entry| entry.repo_id.as_ref() == repo_id.as_str())
            .map(|entry| entry.root.as_ref())
    }

    /// Retry policy for a single embedding request.
    #[must_use]
    pub const fn embedding_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.raw.embedding.max_retries,
            self.raw.embedding.base_delay_ms,
            self.raw.embedding.max_delay_ms,
        )
        .with_jitter_pct(self.raw.embedding.jitter_pct)
    }

    /// Retry policy for a single collection upsert.
    #[must_use]
    pub const fn storage_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.raw.storage.upsert_max_attempts,
            self.raw.storage.upsert_base_delay_ms,
            self.raw.storage.upsert_max_delay_ms,
        )
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &IngestConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> IngestConfig {
        self.raw
    }
}

impl AsRef<IngestConfig> for ValidatedIngestConfig {
    fn as_ref(&self) -> &IngestConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedIngestConfig {
    type Target = IngestConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Parse an ingestion config from a JSON string, applying validation and normalization.
pub fn parse_ingest_config_json(input: &str) -> Result<ValidatedIngestConfig, ErrorEnvelope> {
    let config: IngestConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse an ingestion config from a TOML string, applying validation and normalization.
pub fn parse_ingest_config_toml(input: &str) -> Result<ValidatedIngestConfig, ErrorEnvelope> {
    let config: IngestConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Supported embedding providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` HTTP API.
    #[default]
    OpenAi,
    /// Deterministic offline vectors derived from content hashes.
    Hashed,
}

impl EmbeddingProviderKind {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Hashed => "hashed",
        }
    }

    /// Parse a provider identifier, case-insensitively.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "hashed" => Some(Self::Hashed),
            _ => None,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EmbeddingConfig {
    /// Provider implementation.
    pub provider: EmbeddingProviderKind,
    /// Model name sent to the provider.
    pub model: Box<str>,
    /// Provider base URL; `/embeddings` is appended.
    pub base_url: Box<str>,
    /// API key; usually supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Expected vector dimension.
    pub dimension: u32,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
    /// Maximum concurrent provider calls.
    pub rate_limit: u32,
    /// Attempts per request, including the first.
    pub max_retries: u32,
    /// Backoff base delay (ms).
    pub base_delay_ms: u64,
    /// Backoff cap (ms).
    pub max_delay_ms: u64,
    /// Backoff jitter as a percentage of the delay.
    pub jitter_pct: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: Box::from("text-embedding-3-small"),
            base_url: Box::from("https://api.openai.com/v1"),
            api_key: None,
            dimension: 1_536,
            timeout_ms: 30_000,
            rate_limit: 8,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_pct: 10,
        }
    }
}

impl EmbeddingConfig {
    fn normalize(&mut self) {
        normalize_boxed_str(&mut self.model);
        normalize_boxed_str(&mut self.base_url);
        if self
            .api_key
            .as_ref()
            .is_some_and(|key| key.expose().trim().is_empty())
        {
            self.api_key = None;
        }
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.model.is_empty() {
            return Err(ConfigSchemaError::MissingField {
                section: "embedding",
                field: "model",
            });
        }
        if self.provider == EmbeddingProviderKind::OpenAi {
            validate_http_url("embedding", "baseUrl", &self.base_url)?;
            if self.api_key.is_none() {
                return Err(ConfigSchemaError::MissingField {
                    section: "embedding",
                    field: "apiKey",
                });
            }
        }
        validate_limit_u32(
            "embedding",
            "dimension",
            self.dimension,
            EMBEDDING_DIMENSION_MIN,
            EMBEDDING_DIMENSION_MAX,
        )?;
        validate_timeout_ms(
            "embedding",
            "timeoutMs",
            self.timeout_ms,
            EMBEDDING_TIMEOUT_MIN_MS,
            EMBEDDING_TIMEOUT_MAX_MS,
        )?;
        validate_limit_u32(
            "embedding",
            "rateLimit",
            self.rate_limit,
            EMBEDDING_RATE_LIMIT_MIN,
            EMBEDDING_RATE_LIMIT_MAX,
        )?;
        validate_retry(
            "embedding",
            ("maxRetries", "baseDelayMs", "maxDelayMs"),
            self.max_retries,
            self.base_delay_ms,
            self.max_delay_ms,
        )?;
        validate_limit_u32(
            "embedding",
            "jitterPct",
            self.jitter_pct,
            0,
            RETRY_JITTER_PCT_MAX,
        )
    }
}

/// Batch pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Chunks per embedding batch.
    pub batch_size: u32,
    /// Concurrent batch workers.
    pub max_workers: u32,
    /// Attempts per batch, including the first.
    pub max_retries: u32,
    /// Chunks longer than this many characters are skipped.
    pub max_chunk_chars: u32,
    /// Files processed between checkpoint saves.
    pub checkpoint_every_files: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 4,
            max_retries: 3,
            max_chunk_chars: 24_000,
            checkpoint_every_files: 10,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_limit_u32(
            "pipeline",
            "batchSize",
            self.batch_size,
            PIPELINE_BATCH_SIZE_MIN,
            PIPELINE_BATCH_SIZE_MAX,
        )?;
        validate_limit_u32(
            "pipeline",
            "maxWorkers",
            self.max_workers,
            PIPELINE_MAX_WORKERS_MIN,
            PIPELINE_MAX_WORKERS_MAX,
        )?;
        validate_limit_u32(
            "pipeline",
            "maxRetries",
            self.max_retries,
            RETRY_MAX_ATTEMPTS_MIN,
            RETRY_MAX_ATTEMPTS_MAX,
        )?;
        validate_limit_u32(
            "pipeline",
            "maxChunkChars",
            self.max_chunk_chars,
            PIPELINE_MAX_CHUNK_CHARS_MIN,
            PIPELINE_MAX_CHUNK_CHARS_MAX,
        )?;
        validate_limit_u32(
            "pipeline",
            "checkpointEveryFiles",
            self.checkpoint_every_files,
            PIPELINE_CHECKPOINT_EVERY_MIN,
            PIPELINE_CHECKPOINT_EVERY_MAX,
        )
    }
}

/// Supported vector store backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorProviderKind {
    /// In-process store with optional JSON snapshots.
    #[default]
    Local,
    /// Qdrant over its REST API.
    Qdrant,
}

impl VectorProviderKind {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Qdrant => "qdrant",
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Backend implementation.
    pub provider: VectorProviderKind,
    /// Qdrant REST endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qdrant_url: Option<Box<str>>,
    /// Qdrant API key; usually supplied through the environment.
    #[serde(skip_serializing)]
    pub qdrant_api_key: Option<SecretString>,
    /// Per-request timeout (ms) for remote backends.
    pub timeout_ms: u64,
    /// Directory for local store snapshots; unset keeps the store in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<Box<str>>,
    /// Drop and recreate collections before a run.
    pub recreate_collections: bool,
    /// Attempts per collection upsert, including the first.
    pub upsert_max_attempts: u32,
    /// Upsert backoff base delay (ms).
    pub upsert_base_delay_ms: u64,
    /// Upsert backoff cap (ms).
    pub upsert_max_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: VectorProviderKind::Local,
            qdrant_url: None,
            qdrant_api_key: None,
            timeout_ms: 30_000,
            snapshot_dir: None,
            recreate_collections: false,
            upsert_max_attempts: 3,
            upsert_base_delay_ms: 500,
            upsert_max_delay_ms: 5_000,
        }
    }
}

impl StorageConfig {
    fn normalize(&mut self) {
        normalize_optional_trimmed(&mut self.qdrant_url);
        normalize_optional_trimmed(&mut self.snapshot_dir);
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.provider == VectorProviderKind::Qdrant {
            let Some(url) = self.qdrant_url.as_deref() else {
                return Err(ConfigSchemaError::MissingField {
                    section: "storage",
                    field: "qdrantUrl",
                });
            };
            validate_http_url("storage", "qdrantUrl", url)?;
        }
        validate_timeout_ms(
            "storage",
            "timeoutMs",
            self.timeout_ms,
            STORAGE_TIMEOUT_MIN_MS,
            STORAGE_TIMEOUT_MAX_MS,
        )?;
        validate_retry(
            "storage",
            ("upsertMaxAttempts", "upsertBaseDelayMs", "upsertMaxDelayMs"),
            self.upsert_max_attempts,
            self.upsert_base_delay_ms,
            self.upsert_max_delay_ms,
        )
    }
}

/// Collection name overrides; unset entries keep the default names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CollectionsConfig {
    /// Per-language collection names.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub languages: BTreeMap<Language, String>,
    /// Per-service-bucket collection names.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<ServiceBucket, String>,
    /// Per-concern collection names.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub concerns: BTreeMap<Concern, String>,
}

impl CollectionsConfig {
    /// Build the collection layout, validating every override.
    pub fn to_layout(&self) -> Result<CollectionLayout, ConfigSchemaError> {
        let mut layout = CollectionLayout::default();
        for (language, name) in &self.languages {
            layout = layout.with_language(*language, parse_collection("languages", name)?);
        }
        for (bucket, name) in &self.services {
            layout = layout.with_service(*bucket, parse_collection("services", name)?);
        }
        for (concern, name) in &self.concerns {
            layout = layout.with_concern(*concern, parse_collection("concerns", name)?);
        }
        Ok(layout)
    }
}

fn parse_collection(field: &'static str, name: &str) -> Result<CollectionName, ConfigSchemaError> {
    CollectionName::parse(name).map_err(|_| ConfigSchemaError::InvalidCollectionName {
        section: "collections",
        field,
        name: name.to_owned(),
    })
}

/// Checkpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CheckpointConfig {
    /// Checkpoint file path.
    pub path: Box<str>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: Box::from(".code-ingest/checkpoint.json"),
        }
    }
}

impl CheckpointConfig {
    fn normalize(&mut self) {
        normalize_boxed_str(&mut self.path);
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.path.is_empty() {
            return Err(ConfigSchemaError::MissingField {
                section: "checkpoint",
                field: "path",
            });
        }
        Ok(())
    }
}

/// One repository entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoEntry {
    /// Stable repository identifier.
    pub repo_id: Box<str>,
    /// Repository kind.
    pub repo_type: RepoType,
    /// Source checkout root.
    pub root: Box<str>,
    /// Languages to ingest, in order.
    pub languages: Vec<Language>,
    /// Whether the repository ships Helm charts.
    #[serde(default)]
    pub has_helm: bool,
    /// Other repositories this service calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_dependencies: Vec<String>,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: Priority,
    /// Business domain applied to chunks that carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_domain: Option<String>,
}

impl RepoEntry {
    fn normalize(&mut self) {
        normalize_boxed_str(&mut self.repo_id);
        normalize_boxed_str(&mut self.root);
        let mut seen = BTreeSet::new();
        self.languages.retain(|language| seen.insert(*language));
        self.business_domain = self
            .business_domain
            .take()
            .map(|domain| domain.trim().to_owned())
            .filter(|domain| !domain.is_empty());
    }

    /// Domain classification for this entry.
    pub fn to_repo_config(&self) -> Result<RepoConfig, ConfigSchemaError> {
        let repo_id =
            RepoId::parse(&self.repo_id).map_err(|_| ConfigSchemaError::InvalidRepo {
                repo_id: self.repo_id.to_string(),
                reason: "repoId must not be empty".to_owned(),
            })?;
        if self.root.is_empty() {
            return Err(ConfigSchemaError::InvalidRepo {
                repo_id: repo_id.as_str().to_owned(),
                reason: "root must not be empty".to_owned(),
            });
        }
        if self.languages.is_empty() {
            return Err(ConfigSchemaError::InvalidRepo {
                repo_id: repo_id.as_str().to_owned(),
                reason: "languages must not be empty".to_owned(),
            });
        }

        let mut repo = RepoConfig::new(repo_id, self.repo_type)
            .with_languages(self.languages.iter().copied())
            .with_helm(self.has_helm);
        repo.service_dependencies.clone_from(&self.service_dependencies);
        repo.priority = self.priority;
        repo.business_domain.clone_from(&self.business_domain);
        Ok(repo)
    }
}

/// Typed validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigSchemaError {
    /// Unsupported configuration version.
    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Found version.
        found: u32,
        /// Supported version.
        supported: u32,
    },
    /// A required field is missing or empty.
    #[error("{section}.{field} is required")]
    MissingField {
        /// Section name.
        section: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// Timeout outside the allowed range.
    #[error("{section}.{field} must be between {min_ms} and {max_ms} ms (got {value_ms})")]
    TimeoutOutOfRange {
        /// Section name.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Provided value.
        value_ms: u64,
        /// Minimum allowed value.
        min_ms: u64,
        /// Maximum allowed value.
        max_ms: u64,
    },
    /// Numeric limit outside the allowed range.
    #[error("{section}.{field} must be between {min} and {max} (got {value})")]
    LimitOutOfRange {
        /// Section name.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Provided value.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// Retry delay cap below the base delay.
    #[error("{section} retry maxDelayMs ({max_delay_ms}) must be >= baseDelayMs ({base_delay_ms})")]
    InvalidRetryDelays {
        /// Section name.
        section: &'static str,
        /// Base delay.
        base_delay_ms: u64,
        /// Delay cap.
        max_delay_ms: u64,
    },
    /// URL failed to parse or uses an unsupported scheme.
    #[error("{section}.{field} must be a valid http(s) URL (got {})", sanitize_url_for_error(.url))]
    InvalidUrl {
        /// Section name.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Provided URL.
        url: String,
    },
    /// Collection name override failed validation.
    #[error("{section}.{field} has an invalid collection name: {name}")]
    InvalidCollectionName {
        /// Section name.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Provided name.
        name: String,
    },
    /// Repository entry failed validation.
    #[error("repo {repo_id} is invalid: {reason}")]
    InvalidRepo {
        /// Repository id as given.
        repo_id: String,
        /// Failure reason.
        reason: String,
    },
    /// Two repository entries share an id.
    #[error("repo {repo_id} is configured more than once")]
    DuplicateRepo {
        /// Duplicated id.
        repo_id: String,
    },
}

impl ConfigSchemaError {
    /// Stable error code for this failure.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::MissingField { .. } => "missing_field",
            Self::TimeoutOutOfRange { .. } => "invalid_timeout",
            Self::LimitOutOfRange { .. } => "invalid_limit",
            Self::InvalidRetryDelays { .. } => "invalid_retry",
            Self::InvalidUrl { .. } => "invalid_url",
            Self::InvalidCollectionName { .. } => "invalid_collection_name",
            Self::InvalidRepo { .. } => "invalid_repo",
            Self::DuplicateRepo { .. } => "duplicate_repo",
        };
        ErrorCode::new("config", code)
    }
}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let mut envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::MissingField { section, field } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
            ConfigSchemaError::TimeoutOutOfRange {
                section,
                field,
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::InvalidRetryDelays {
                section,
                base_delay_ms,
                max_delay_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("base_delay_ms", base_delay_ms.to_string())
                    .with_metadata("max_delay_ms", max_delay_ms.to_string());
            },
            ConfigSchemaError::InvalidUrl {
                section,
                field,
                url,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("url", sanitize_url_for_error(&url));
            },
            ConfigSchemaError::InvalidCollectionName {
                section,
                field,
                name,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("name", name);
            },
            ConfigSchemaError::InvalidRepo { repo_id, reason } => {
                envelope = envelope
                    .with_metadata("repo_id", repo_id)
                    .with_metadata("reason", reason);
            },
            ConfigSchemaError::DuplicateRepo { repo_id } => {
                envelope = envelope.with_metadata("repo_id", repo_id);
            },
        }

        envelope
    }
}

const fn validate_timeout_ms(
    section: &'static str,
    field: &'static str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigSchemaError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigSchemaError::TimeoutOutOfRange {
            section,
            field,
            value_ms,
            min_ms,
            max_ms,
        });
    }
    Ok(())
}

fn validate_http_url(
    section: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigSchemaError> {
    let parsed = Url::parse(value).map_err(|_| ConfigSchemaError::InvalidUrl {
        section,
        field,
        url: value.to_owned(),
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigSchemaError::InvalidUrl {
            section,
            field,
            url: value.to_owned(),
        });
    }

    Ok(())
}

fn validate_limit_u32(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value: u64::from(value),
            min: u64::from(min),
            max: u64::from(max),
        });
    }
    Ok(())
}

const fn validate_limit_u64(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::LimitOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Field names of one retry block: attempts, base delay, delay cap.
type RetryFields = (&'static str, &'static str, &'static str);

fn validate_retry(
    section: &'static str,
    (attempts_field, base_field, max_field): RetryFields,
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
) -> Result<(), ConfigSchemaError> {
    validate_limit_u32(
        section,
        attempts_field,
        max_attempts,
        RETRY_MAX_ATTEMPTS_MIN,
        RETRY_MAX_ATTEMPTS_MAX,
    )?;
    validate_limit_u64(
        section,
        base_field,
        base_delay_ms,
        RETRY_BASE_DELAY_MIN_MS,
        RETRY_BASE_DELAY_MAX_MS,
    )?;
    validate_limit_u64(
        section,
        max_field,
        max_delay_ms,
        RETRY_MAX_DELAY_MIN_MS,
        RETRY_MAX_DELAY_MAX_MS,
    )?;
    if max_delay_ms < base_delay_ms {
        return Err(ConfigSchemaError::InvalidRetryDelays {
            section,
            base_delay_ms,
            max_delay_ms,
        });
    }
    Ok(())
}

fn normalize_optional_trimmed(value: &mut Option<Box<str>>) {
    let Some(current) = value.as_deref() else {
        return;
    };
    let trimmed = current.trim();
    if trimmed.is_empty() {
        *value = None;
    } else if trimmed.len() != current.len() {
        *value = Some(Box::from(trimmed));
    }
}

fn normalize_boxed_str(value: &mut Box<str>) {
    let trimmed = value.trim();
    if trimmed == value.as_ref() {
        return;
    }
    *value = trimmed.to_owned().into_boxed_str();
}
