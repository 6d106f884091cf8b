//! Ingest command handler.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, format_error_output, to_json_line};
use code_ingest_app::IngestionReport;
use code_ingest_domain::RepoId;
use code_ingest_infra::IngestRuntime;
use code_ingest_shared::{ErrorEnvelope, RequestContext};
use std::fmt::Write;
use std::path::Path;

/// Scan and ingest the configured repositories, or only `repo`.
pub async fn run_ingest(
    ctx: &RequestContext,
    mode: OutputMode,
    runtime: &IngestRuntime,
    repo: Option<&str>,
    root: Option<&Path>,
) -> Result<CliOutput, CliError> {
    let only = match repo.map(RepoId::parse).transpose() {
        Ok(only) => only,
        Err(error) => return Ok(format_error_output(mode, &ErrorEnvelope::from(error))),
    };

    let sources = match runtime.discover_sources(ctx, only.as_ref(), root).await {
        Ok(sources) => sources,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    match runtime.ingestor().ingest_all(ctx, sources).await {
        Ok(report) => format_report(mode, &report),
        Err(error) => Ok(format_error_output(mode, &error)),
    }
}

fn format_report(mode: OutputMode, report: &IngestionReport) -> Result<CliOutput, CliError> {
    let status = if report.lost == 0 && report.error_count == 0 {
        "ok"
    } else {
        "partial"
    };
    if mode.is_json() {
        let payload = serde_json::json!({
            "status": status,
            "report": report,
        });
        return Ok(CliOutput::ok(to_json_line(&payload)?));
    }

    let mut out = String::new();
    let _ = writeln!(out, "status: {status}");
    let _ = writeln!(out, "stored: {}", report.stored);
    let _ = writeln!(out, "lost: {}", report.lost);
    let _ = writeln!(out, "oversized: {}", report.oversized);
    let _ = writeln!(out, "skipped files: {}", report.skipped_files);
    for (language, files) in &report.files_by_language {
        let _ = writeln!(out, "files[{language}]: {files}");
    }
    for (collection, chunks) in &report.chunks_by_collection {
        let _ = writeln!(out, "chunks[{collection}]: {chunks}");
    }
    for error in &report.errors {
        let _ = writeln!(out, "error: {error}");
    }
    Ok(CliOutput::ok(out))
}
