//! Config command handler.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line};
use code_ingest_infra::load_effective_config_json;
use std::collections::BTreeMap;
use std::path::Path;

/// Print the effective config; secrets are never included.
pub fn run_config_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    config_path: Option<&Path>,
) -> Result<CliOutput, CliError> {
    let json = match load_effective_config_json(env, config_path) {
        Ok(json) => json,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    if !mode.is_json() {
        return Ok(CliOutput::ok(json));
    }
    let effective: serde_json::Value = serde_json::from_str(&json)?;
    let payload = serde_json::json!({
        "status": "ok",
        "effectiveConfig": effective,
    });
    Ok(CliOutput::ok(to_json_line(&payload)?))
}
