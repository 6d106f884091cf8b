//! CLI flow E2E tests: ingest, inspect, search and reset a local store.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

fn run_cli(dir: &Path, args: &[&str]) -> io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_code-ingest"))
        .current_dir(dir)
        .env_remove("INGEST_EMBEDDING_PROVIDER")
        .env_remove("INGEST_EMBEDDING_API_KEY")
        .env_remove("INGEST_STORAGE_PROVIDER")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
}

fn stdout_json(output: &Output) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let stdout = String::from_utf8(output.stdout.clone())?;
    Ok(serde_json::from_str(stdout.trim())?)
}

fn write_fixture(root: &Path) -> io::Result<()> {
    let repo = root.join("orders-api");
    fs::create_dir_all(repo.join("src"))?;
    fs::create_dir_all(repo.join("helm"))?;
    fs::create_dir_all(repo.join("target"))?;
    fs::write(
        repo.join("src/retry.rs"),
        "pub fn backoff(attempt: u32) -> u64 {\n    1_000 * 2u64.pow(attempt)\n}\n",
    )?;
    fs::write(repo.join("helm/values.yaml"), "replicaCount: 3\n")?;
    fs::write(repo.join("target/ignored.rs"), "fn ignored() {}\n")?;

    let config = r#"version = 1

[embedding]
provider = "hashed"
model = "hashed-e2e"
dimension = 32

[pipeline]
batchSize = 1
maxWorkers = 2

[storage]
provider = "local"
snapshotDir = "state/vectors"

[checkpoint]
path = "state/checkpoint.json"

[[repos]]
repoId = "orders-api"
repoType = "backend"
root = "orders-api"
languages = ["rust", "yaml"]
hasHelm = true
"#;
    fs::write(root.join("ingest.toml"), config)
}

#[test]
fn ingest_then_inspect_and_search() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_fixture(dir.path())?;

    let ingest = run_cli(dir.path(), &["--config", "ingest.toml", "ingest"])?;
    assert_eq!(ingest.status.code(), Some(0), "{ingest:?}");
    let report = stdout_json(&ingest)?;
    assert_eq!(report["status"], "ok");
    assert_eq!(report["report"]["stored"], 2);
    assert_eq!(report["report"]["chunks_by_collection"]["deployment_configs"], 1);
    assert_eq!(report["report"]["chunks_by_collection"]["backend_services"], 2);

    let info = run_cli(dir.path(), &["--config", "ingest.toml", "collections", "info"])?;
    assert_eq!(info.status.code(), Some(0));
    let info = stdout_json(&info)?;
    let rust = info["collections"]
        .as_array()
        .and_then(|rows| rows.iter().find(|row| row["name"] == "rust_code"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(rust["count"], 1);

    let search = run_cli(
        dir.path(),
        &[
            "--config",
            "ingest.toml",
            "search",
            "--collection",
            "rust_code",
            "--query",
            "exponential backoff",
            "--limit",
            "3",
        ],
    )?;
    assert_eq!(search.status.code(), Some(0));
    let search = stdout_json(&search)?;
    assert_eq!(search["results"][0]["filePath"], "src/retry.rs");

    let checkpoint = run_cli(dir.path(), &["--config", "ingest.toml", "checkpoint", "show"])?;
    assert_eq!(checkpoint.status.code(), Some(0));
    assert!(stdout_json(&checkpoint)?["checkpoint"].is_null());
    Ok(())
}

#[test]
fn invalid_inputs_exit_with_code_two() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_fixture(dir.path())?;

    let missing = run_cli(dir.path(), &["--config", "missing.toml", "config", "show"])?;
    assert_eq!(missing.status.code(), Some(2));

    let unknown = run_cli(
        dir.path(),
        &["--config", "ingest.toml", "ingest", "--repo", "billing"],
    )?;
    assert_eq!(unknown.status.code(), Some(2));
    assert_eq!(stdout_json(&unknown)?["error"]["code"], "core:not_found");

    let bad_limit = run_cli(
        dir.path(),
        &[
            "--config",
            "ingest.toml",
            "search",
            "--collection",
            "rust_code",
            "--query",
            "x",
            "--limit",
            "0",
        ],
    )?;
    assert_eq!(bad_limit.status.code(), Some(2));
    Ok(())
}
