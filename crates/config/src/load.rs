//! Config loading helpers (file + env).
//!
//! Precedence, highest wins: env overrides, config file, defaults. The loader
//! surfaces user-facing errors as typed `ErrorEnvelope`s.

use crate::{IngestConfig, IngestEnv, ValidatedIngestConfig, apply_env_overrides};
use code_ingest_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the ingestion config from an optional file path and parsed env overrides.
pub fn load_ingest_config_from_path(
    config_path: Option<&Path>,
    env: &IngestEnv,
) -> Result<ValidatedIngestConfig, ErrorEnvelope> {
    let config = match config_path {
        None => IngestConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the ingestion config from the process environment and an optional file path.
pub fn load_ingest_config_std_env(
    config_path: Option<&Path>,
) -> Result<ValidatedIngestConfig, ErrorEnvelope> {
    let env = IngestEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_ingest_config_from_path(config_path, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
///
/// Secrets are never written.
pub fn to_pretty_json(config: &IngestConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<IngestConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unknown_extensions_are_rejected() {
        let result = detect_config_format(&PathBuf::from("ingest.yaml"));
        assert!(result.is_err_and(|error| error.code.code() == "unsupported_format"));
    }

    #[test]
    fn missing_files_report_their_path() {
        let result = read_config_file(&PathBuf::from("/definitely/missing/ingest.toml"));
        assert!(result.is_err_and(|error| {
            error.code.code() == "config_file_not_found"
                && error.metadata.get("path").map(String::as_str)
                    == Some("/definitely/missing/ingest.toml")
        }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = parse_config_unvalidated(r#"{"pipline": {}}"#, ConfigFormat::Json);
        assert!(result.is_err_and(|error| error.code.code() == "invalid_json"));
    }
}
