//! Config loading helpers for CLI surfaces.

use crate::InfraResult;
use code_ingest_config::{IngestEnv, load_ingest_config_from_path, to_pretty_json};
use code_ingest_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective config, returning deterministic pretty JSON.
///
/// Secrets are omitted from the output.
pub fn load_effective_config_json(
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
) -> InfraResult<String> {
    let env = IngestEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    let config = load_ingest_config_from_path(config_path, &env)?;
    to_pretty_json(config.as_ref())
}
