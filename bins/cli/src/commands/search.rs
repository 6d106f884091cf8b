//! Search command handler.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line};
use code_ingest_domain::CollectionName;
use code_ingest_infra::IngestRuntime;
use code_ingest_shared::{ErrorEnvelope, RequestContext};
use serde_json::Value;
use std::fmt::Write;

/// Inputs for search command execution.
pub struct SearchCommandInput<'a> {
    pub collection: &'a str,
    pub query: &'a str,
    pub limit: u32,
    pub threshold: Option<f32>,
}

/// Run the search command.
pub async fn run_search(
    ctx: &RequestContext,
    mode: OutputMode,
    runtime: &IngestRuntime,
    input: &SearchCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let collection = match CollectionName::parse(input.collection) {
        Ok(collection) => collection,
        Err(error) => return Ok(format_error_output(mode, &ErrorEnvelope::from(error))),
    };
    let hits = match runtime
        .search()
        .search(ctx, &collection, input.query, input.limit, input.threshold)
        .await
    {
        Ok(hits) => hits,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let results: Vec<Value> = hits
        .iter()
        .map(|hit| {
            serde_json::json!({
                "id": hit.id.as_str(),
                "score": hit.score,
                "filePath": hit.payload.get("file_path"),
                "startLine": hit.payload.get("start_line"),
                "endLine": hit.payload.get("end_line"),
                "itemName": hit.payload.get("item_name"),
                "content": hit.payload.get("content"),
            })
        })
        .collect();

    if mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "collection": collection.as_str(),
            "results": results,
        });
        return Ok(CliOutput::ok(to_json_line(&payload)?));
    }
    Ok(CliOutput::ok(format_search_text(&results)))
}

fn format_search_text(results: &[Value]) -> String {
    let mut out = String::new();
    out.push_str("status: ok\n");
    let _ = writeln!(out, "results: {}", results.len());

    for result in results {
        let _ = writeln!(
            out,
            "{}:{}-{} score={:.4}",
            result["filePath"].as_str().unwrap_or("?"),
            result["startLine"].as_u64().unwrap_or_default(),
            result["endLine"].as_u64().unwrap_or_default(),
            result["score"].as_f64().unwrap_or_default(),
        );
    }

    out
}
