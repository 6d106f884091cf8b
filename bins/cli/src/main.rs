//! CLI binary entrypoint.

mod commands;
mod error;
mod format;

use clap::{Parser, Subcommand};
use code_ingest_config::load_ingest_config_std_env;
use code_ingest_infra::IngestRuntime;
use code_ingest_shared::{ErrorEnvelope, RequestContext, redact_if_secret};
use commands::{
    SearchCommandInput, run_checkpoint_clear, run_checkpoint_show, run_collections_info,
    run_config_show, run_ingest, run_search,
};
use error::{CliError, ExitCode};
use format::{LogFormat, OutputArgs, OutputMode};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "code-ingest",
    version,
    about = "Embed source repositories into routed vector collections",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    /// Config file path (JSON/TOML). Defaults and `INGEST_*` env apply without it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest configured repositories.
    Ingest {
        /// Only ingest this repository.
        #[arg(long)]
        repo: Option<String>,
        /// Override the source root of `--repo`.
        #[arg(long, requires = "repo")]
        root: Option<PathBuf>,
    },
    /// Inspect or reset the resume checkpoint.
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
    /// Inspect vector collections.
    Collections {
        #[command(subcommand)]
        command: CollectionsCommands,
    },
    /// Search one collection with a natural-language query.
    Search {
        /// Collection to search.
        #[arg(long)]
        collection: String,
        /// Query text.
        #[arg(long)]
        query: String,
        /// Maximum number of hits.
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Minimum score of returned hits.
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CheckpointCommands {
    /// Print the stored checkpoint.
    Show,
    /// Delete the stored checkpoint.
    Clear,
}

#[derive(Debug, Subcommand)]
enum CollectionsCommands {
    /// Record count and status of every configured collection.
    Info,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective config (file + env) as JSON, without secrets.
    Show,
}

pub(crate) struct CliOutput {
    pub(crate) stdout: String,
    pub(crate) exit_code: ExitCode,
}

impl CliOutput {
    pub(crate) const fn ok(stdout: String) -> Self {
        Self {
            stdout,
            exit_code: ExitCode::Ok,
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.output.log_format);
    let mode = OutputMode::from_args(&cli.output);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(run(&cli, mode)));

    match result {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    let installed = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        let _ = writeln!(io::stderr(), "warning: logging disabled: {error}");
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

async fn run(cli: &Cli, mode: OutputMode) -> Result<CliOutput, CliError> {
    if let Commands::Config {
        command: ConfigCommands::Show,
    } = &cli.command
    {
        return run_config_show(mode, &collect_scoped_env("INGEST_"), cli.config.as_deref());
    }

    let config = match load_ingest_config_std_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let runtime = match IngestRuntime::build(config) {
        Ok(runtime) => runtime,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let ctx = RequestContext::new_run();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            signal_ctx.cancel();
        }
    });

    match &cli.command {
        Commands::Ingest { repo, root } => {
            run_ingest(&ctx, mode, &runtime, repo.as_deref(), root.as_deref()).await
        },
        Commands::Checkpoint { command } => match command {
            CheckpointCommands::Show => run_checkpoint_show(mode, &runtime).await,
            CheckpointCommands::Clear => run_checkpoint_clear(mode, &runtime).await,
        },
        Commands::Collections {
            command: CollectionsCommands::Info,
        } => run_collections_info(&ctx, mode, &runtime).await,
        Commands::Search {
            collection,
            query,
            limit,
            threshold,
        } => {
            let input = SearchCommandInput {
                collection,
                query,
                limit: *limit,
                threshold: *threshold,
            };
            run_search(&ctx, mode, &runtime, &input).await
        },
        Commands::Config { .. } => Err(CliError::InvalidInput("unknown config command".to_owned())),
    }
}

/// Render a pipeline error on stdout with its mapped exit code.
pub(crate) fn format_error_output(mode: OutputMode, error: &ErrorEnvelope) -> CliOutput {
    let metadata: BTreeMap<&str, String> = error
        .metadata
        .iter()
        .map(|(key, value)| (key.as_str(), redact_if_secret(key, value)))
        .collect();

    let stdout = if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "error": {
                "code": error.code.to_string(),
                "kind": error.kind,
                "message": error.message,
                "metadata": metadata,
            },
        });
        // JSON serialization errors at the CLI boundary are internal.
        let mut output = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"code\":\"core:internal\"}}".to_owned()
        });
        output.push('\n');
        output
    } else {
        let mut output = format!("status: error\ncode: {}\nmessage: {}\n", error.code, error.message);
        for (key, value) in &metadata {
            let _ = writeln!(output, "{key}: {value}");
        }
        output
    };

    CliOutput {
        stdout,
        exit_code: ExitCode::for_envelope(error),
    }
}

/// Serialize `payload` as pretty JSON with a trailing newline.
pub(crate) fn to_json_line(payload: &serde_json::Value) -> Result<String, CliError> {
    let mut output = serde_json::to_string_pretty(payload)?;
    output.push('\n');
    Ok(output)
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OutputFormat;
    use clap::CommandFactory;
    use code_ingest_shared::ErrorCode;

    #[test]
    fn version_flag_is_supported() {
        let result = Cli::command().try_get_matches_from(["cli", "--version"]);
        let is_version = matches!(
            result,
            Err(error) if error.kind() == clap::error::ErrorKind::DisplayVersion
        );

        assert!(is_version, "expected clap to render version");
    }

    #[test]
    fn cli_parses_ingest_flags() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "cli",
            "ingest",
            "--config",
            "/etc/ingest.toml",
            "--repo",
            "orders-api",
            "--root",
            "/src/orders",
        ])?;
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ingest.toml")));
        match cli.command {
            Commands::Ingest { repo, root } => {
                assert_eq!(repo.as_deref(), Some("orders-api"));
                assert_eq!(root, Some(PathBuf::from("/src/orders")));
            },
            _ => return Err("expected ingest command".into()),
        }
        Ok(())
    }

    #[test]
    fn root_requires_repo() {
        let result = Cli::try_parse_from(["cli", "ingest", "--root", "/src"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_search_flags() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "cli",
            "--output",
            "text",
            "--log-format",
            "json",
            "search",
            "--collection",
            "rust_code",
            "--query",
            "retry policy",
            "--limit",
            "3",
            "--threshold",
            "0.5",
        ])?;
        assert_eq!(cli.output.output, OutputFormat::Text);
        assert_eq!(cli.output.log_format, LogFormat::Json);
        match cli.command {
            Commands::Search {
                collection,
                query,
                limit,
                threshold,
            } => {
                assert_eq!(collection, "rust_code");
                assert_eq!(query, "retry policy");
                assert_eq!(limit, 3);
                assert!(threshold.is_some_and(|value| (value - 0.5).abs() < 1e-6));
            },
            _ => return Err("expected search command".into()),
        }
        Ok(())
    }

    #[test]
    fn error_output_redacts_secret_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let error = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad key")
            .with_metadata("apiKey", "sk-secret")
            .with_metadata("field", "timeoutMs");
        let output = format_error_output(OutputMode { format: OutputFormat::Json }, &error);

        assert_eq!(output.exit_code, ExitCode::InvalidInput);
        assert!(!output.stdout.contains("sk-secret"));
        let value: serde_json::Value = serde_json::from_str(output.stdout.trim())?;
        assert_eq!(value["error"]["metadata"]["field"], "timeoutMs");
        assert_eq!(value["error"]["code"], "core:invalid_input");
        Ok(())
    }
}
