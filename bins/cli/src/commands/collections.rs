//! Collection inspection handler.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line};
use code_ingest_infra::IngestRuntime;
use code_ingest_shared::RequestContext;
use std::fmt::Write;

/// Report count and status of every collection in the configured layout.
///
/// Collections the backend does not know are listed as missing.
pub async fn run_collections_info(
    ctx: &RequestContext,
    mode: OutputMode,
    runtime: &IngestRuntime,
) -> Result<CliOutput, CliError> {
    let mut rows = Vec::new();
    for name in runtime.config().layout().all() {
        let row = match runtime.backend().collection_info(ctx, name.clone()).await {
            Ok(info) => serde_json::json!({
                "name": name.as_str(),
                "count": info.count,
                "status": info.status.as_str(),
            }),
            Err(error) if error.is_cancelled() => return Ok(format_error_output(mode, &error)),
            Err(error) => serde_json::json!({
                "name": name.as_str(),
                "status": "missing",
                "error": error.code.to_string(),
            }),
        };
        rows.push(row);
    }

    if mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "backend": runtime.backend().provider_id(),
            "collections": rows,
        });
        return Ok(CliOutput::ok(to_json_line(&payload)?));
    }

    let mut out = format!("status: ok\nbackend: {}\n", runtime.backend().provider_id());
    for row in &rows {
        let _ = writeln!(
            out,
            "{} count={} status={}",
            row["name"].as_str().unwrap_or_default(),
            row["count"].as_u64().unwrap_or_default(),
            row["status"].as_str().unwrap_or_default(),
        );
    }
    Ok(CliOutput::ok(out))
}
