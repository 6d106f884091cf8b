//! Checkpoint command handlers.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, to_json_line};
use code_ingest_infra::IngestRuntime;

/// Print the stored checkpoint, if any.
pub async fn run_checkpoint_show(
    mode: OutputMode,
    runtime: &IngestRuntime,
) -> Result<CliOutput, CliError> {
    let checkpoint = runtime.checkpoints().load_latest().await;
    if mode.is_json() {
        let payload = serde_json::json!({
            "status": "ok",
            "checkpoint": checkpoint,
        });
        return Ok(CliOutput::ok(to_json_line(&payload)?));
    }

    let stdout = match checkpoint {
        None => "status: ok\ncheckpoint: none\n".to_owned(),
        Some(checkpoint) => format!(
            "status: ok\nrepo: {}\nlanguage: {}\nfiles: {}\nchunks: {}\nerrors: {}\nupdated: {}\n",
            checkpoint.repo_id,
            checkpoint.language,
            checkpoint.processed_files.len(),
            checkpoint.chunks_processed,
            checkpoint.errors.len(),
            checkpoint.timestamp.to_rfc3339(),
        ),
    };
    Ok(CliOutput::ok(stdout))
}

/// Delete the stored checkpoint.
pub async fn run_checkpoint_clear(
    mode: OutputMode,
    runtime: &IngestRuntime,
) -> Result<CliOutput, CliError> {
    if !runtime.checkpoints().clear().await {
        return Err(CliError::Io(std::io::Error::other(
            "checkpoint could not be removed",
        )));
    }
    if mode.is_json() {
        return Ok(CliOutput::ok(to_json_line(&serde_json::json!({
            "status": "ok",
            "cleared": true,
        }))?));
    }
    Ok(CliOutput::ok("status: ok\ncleared: true\n".to_owned()))
}
