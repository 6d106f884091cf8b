//! Environment variable parsing and merging into [`IngestConfig`].
//!
//! Only variables with the `INGEST_` prefix are read. Values are parsed
//! eagerly so a malformed variable fails before any work starts.

use crate::schema::{
    EmbeddingProviderKind, IngestConfig, ValidatedIngestConfig, VectorProviderKind,
};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, SecretString, redact_if_secret};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Embedding provider (`openai` or `hashed`).
pub const ENV_EMBEDDING_PROVIDER: &str = "INGEST_EMBEDDING_PROVIDER";
/// Embedding API key.
pub const ENV_EMBEDDING_API_KEY: &str = "INGEST_EMBEDDING_API_KEY";
/// Embedding API base URL.
pub const ENV_EMBEDDING_BASE_URL: &str = "INGEST_EMBEDDING_BASE_URL";
/// Embedding model name.
pub const ENV_EMBEDDING_MODEL: &str = "INGEST_EMBEDDING_MODEL";
/// Embedding vector dimension.
pub const ENV_EMBEDDING_DIMENSION: &str = "INGEST_EMBEDDING_DIMENSION";
/// Chunks per batch.
pub const ENV_BATCH_SIZE: &str = "INGEST_BATCH_SIZE";
/// Concurrent batch workers.
pub const ENV_MAX_WORKERS: &str = "INGEST_MAX_WORKERS";
/// Attempts per batch.
pub const ENV_MAX_RETRIES: &str = "INGEST_MAX_RETRIES";
/// Concurrent embedding calls.
pub const ENV_RATE_LIMIT: &str = "INGEST_RATE_LIMIT";
/// Vector store provider (`local` or `qdrant`).
pub const ENV_STORAGE_PROVIDER: &str = "INGEST_STORAGE_PROVIDER";
/// Qdrant REST endpoint.
pub const ENV_QDRANT_URL: &str = "INGEST_QDRANT_URL";
/// Qdrant API key.
pub const ENV_QDRANT_API_KEY: &str = "INGEST_QDRANT_API_KEY";
/// Checkpoint file path.
pub const ENV_CHECKPOINT_PATH: &str = "INGEST_CHECKPOINT_PATH";

const KNOWN_VARS: &[&str] = &[
    ENV_EMBEDDING_PROVIDER,
    ENV_EMBEDDING_API_KEY,
    ENV_EMBEDDING_BASE_URL,
    ENV_EMBEDDING_MODEL,
    ENV_EMBEDDING_DIMENSION,
    ENV_BATCH_SIZE,
    ENV_MAX_WORKERS,
    ENV_MAX_RETRIES,
    ENV_RATE_LIMIT,
    ENV_STORAGE_PROVIDER,
    ENV_QDRANT_URL,
    ENV_QDRANT_API_KEY,
    ENV_CHECKPOINT_PATH,
];

/// Parsed `INGEST_*` overrides. Unset variables are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestEnv {
    /// Embedding provider override.
    pub embedding_provider: Option<EmbeddingProviderKind>,
    /// Embedding API key.
    pub embedding_api_key: Option<SecretString>,
    /// Embedding base URL override.
    pub embedding_base_url: Option<Box<str>>,
    /// Embedding model override.
    pub embedding_model: Option<Box<str>>,
    /// Embedding dimension override.
    pub embedding_dimension: Option<u32>,
    /// Batch size override.
    pub batch_size: Option<u32>,
    /// Worker count override.
    pub max_workers: Option<u32>,
    /// Batch attempt limit override.
    pub max_retries: Option<u32>,
    /// Embedding concurrency override.
    pub rate_limit: Option<u32>,
    /// Storage provider override.
    pub storage_provider: Option<VectorProviderKind>,
    /// Qdrant URL override.
    pub qdrant_url: Option<Box<str>>,
    /// Qdrant API key.
    pub qdrant_api_key: Option<SecretString>,
    /// Checkpoint path override.
    pub checkpoint_path: Option<Box<str>>,
}

impl IngestEnv {
    /// Read the known variables from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map = KNOWN_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok().map(|value| ((*var).to_owned(), value)))
            .collect::<BTreeMap<_, _>>();
        Self::from_map(&map)
    }

    /// Parse overrides from a variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            embedding_provider: parse_optional_enum(
                map,
                ENV_EMBEDDING_PROVIDER,
                EmbeddingProviderKind::parse,
            )?,
            embedding_api_key: parse_optional_secret(map, ENV_EMBEDDING_API_KEY)?,
            embedding_base_url: parse_optional_url_string(map, ENV_EMBEDDING_BASE_URL)?,
            embedding_model: parse_optional_trimmed_string(map, ENV_EMBEDDING_MODEL)?,
            embedding_dimension: parse_optional_u32(map, ENV_EMBEDDING_DIMENSION)?,
            batch_size: parse_optional_u32(map, ENV_BATCH_SIZE)?,
            max_workers: parse_optional_u32(map, ENV_MAX_WORKERS)?,
            max_retries: parse_optional_u32(map, ENV_MAX_RETRIES)?,
            rate_limit: parse_optional_u32(map, ENV_RATE_LIMIT)?,
            storage_provider: parse_optional_enum(map, ENV_STORAGE_PROVIDER, |value| {
                match value.trim().to_ascii_lowercase().as_str() {
                    "local" => Some(VectorProviderKind::Local),
                    "qdrant" => Some(VectorProviderKind::Qdrant),
                    _ => None,
                }
            })?,
            qdrant_url: parse_optional_url_string(map, ENV_QDRANT_URL)?,
            qdrant_api_key: parse_optional_secret(map, ENV_QDRANT_API_KEY)?,
            checkpoint_path: parse_optional_trimmed_string(map, ENV_CHECKPOINT_PATH)?,
        })
    }
}

/// Apply env overrides to a base config, then validate.
pub fn apply_env_overrides(
    base: IngestConfig,
    env: &IngestEnv,
) -> Result<ValidatedIngestConfig, ErrorEnvelope> {
    let mut config = base;

    if let Some(provider) = env.embedding_provider {
        config.embedding.provider = provider;
    }
    if let Some(key) = &env.embedding_api_key {
        config.embedding.api_key = Some(key.clone());
    }
    set_boxed(&mut config.embedding.base_url, env.embedding_base_url.as_deref());
    set_boxed(&mut config.embedding.model, env.embedding_model.as_deref());
    set_u32(&mut config.embedding.dimension, env.embedding_dimension);
    set_u32(&mut config.embedding.rate_limit, env.rate_limit);

    set_u32(&mut config.pipeline.batch_size, env.batch_size);
    set_u32(&mut config.pipeline.max_workers, env.max_workers);
    set_u32(&mut config.pipeline.max_retries, env.max_retries);

    if let Some(provider) = env.storage_provider {
        config.storage.provider = provider;
    }
    if let Some(url) = &env.qdrant_url {
        config.storage.qdrant_url = Some(url.clone());
    }
    if let Some(key) = &env.qdrant_api_key {
        config.storage.qdrant_api_key = Some(key.clone());
    }
    set_boxed(&mut config.checkpoint.path, env.checkpoint_path.as_deref());

    config.validate_and_normalize().map_err(Into::into)
}

fn set_boxed(target: &mut Box<str>, value: Option<&str>) {
    if let Some(value) = value {
        *target = Box::from(value);
    }
}

const fn set_u32(target: &mut u32, value: Option<u32>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Errors produced while parsing environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvParseError {
    /// Variable is set but blank.
    #[error("{var} must not be empty")]
    EmptyValue {
        /// Variable name.
        var: &'static str,
    },
    /// Secret variable is set but blank.
    #[error("{var} must not be empty")]
    EmptySecret {
        /// Variable name.
        var: &'static str,
    },
    /// Variable is not a non-negative integer.
    #[error("{var} must be an integer (got {value})")]
    InvalidInt {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// Variable is not an http(s) URL.
    #[error("{var} must be a valid http(s) URL")]
    InvalidUrl {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
    /// Variable is not one of the accepted values.
    #[error("{var} has an unsupported value: {value}")]
    InvalidEnum {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

impl EnvParseError {
    /// Stable error code for this failure.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::EmptyValue { .. } => "empty_env_var",
            Self::EmptySecret { .. } => "empty_env_secret",
            Self::InvalidInt { .. } => "invalid_env_int",
            Self::InvalidUrl { .. } => "invalid_env_url",
            Self::InvalidEnum { .. } => "invalid_env_enum",
        };
        ErrorCode::new("config", code)
    }
}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } | EnvParseError::EmptySecret { var } => {
                envelope = envelope.with_metadata("env_var", var);
            },
            EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidUrl { var, value }
            | EnvParseError::InvalidEnum { var, value } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", redact_if_secret(var, &value));
            },
        }

        envelope
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(Box::from(trimmed)))
}

fn parse_optional_secret(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<SecretString>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptySecret { var });
    }
    Ok(Some(SecretString::new(trimmed)))
}

fn parse_optional_url_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(value) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };
    match Url::parse(&value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Some(value)),
        _ => Err(EnvParseError::InvalidUrl {
            var,
            value: value.into_string(),
        }),
    }
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_enum<T>(
    map: &BTreeMap<String, String>,
    var: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, EnvParseError> {
    let Some(raw) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };
    parse(&raw).map(Some).ok_or_else(|| EnvParseError::InvalidEnum {
        var,
        value: raw.into_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn unset_variables_parse_to_none() -> Result<(), EnvParseError> {
        assert_eq!(IngestEnv::from_map(&BTreeMap::new())?, IngestEnv::default());
        Ok(())
    }

    #[test]
    fn blank_secret_is_rejected() {
        let result = IngestEnv::from_map(&map(&[(ENV_EMBEDDING_API_KEY, "  ")]));
        assert_eq!(
            result,
            Err(EnvParseError::EmptySecret {
                var: ENV_EMBEDDING_API_KEY
            })
        );
    }

    #[test]
    fn non_numeric_limits_are_rejected() -> Result<(), EnvParseError> {
        let Err(error) = IngestEnv::from_map(&map(&[(ENV_MAX_WORKERS, "four")])) else {
            return Err(EnvParseError::EmptyValue {
                var: ENV_MAX_WORKERS,
            });
        };
        let envelope: ErrorEnvelope = error.into();
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_env_int"));
        assert_eq!(
            envelope.metadata.get("value").map(String::as_str),
            Some("four")
        );
        Ok(())
    }

    #[test]
    fn invalid_secret_values_are_redacted_in_envelopes() {
        let error = EnvParseError::InvalidEnum {
            var: ENV_QDRANT_API_KEY,
            value: "sk-live".to_owned(),
        };
        let envelope: ErrorEnvelope = error.into();
        assert_eq!(
            envelope.metadata.get("value").map(String::as_str),
            Some(code_ingest_shared::REDACTED)
        );
    }

    #[test]
    fn provider_values_are_case_insensitive() -> Result<(), EnvParseError> {
        let env = IngestEnv::from_map(&map(&[
            (ENV_EMBEDDING_PROVIDER, "Hashed"),
            (ENV_STORAGE_PROVIDER, "QDRANT"),
        ]))?;
        assert_eq!(env.embedding_provider, Some(EmbeddingProviderKind::Hashed));
        assert_eq!(env.storage_provider, Some(VectorProviderKind::Qdrant));
        Ok(())
    }
}
