//! Repository source discovery.

use code_ingest_ports::{Language, SourceFile};
use code_ingest_shared::{ErrorEnvelope, RequestContext, Result};
use std::path::{Path, PathBuf};

/// Directory names never descended into.
pub const SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// Walk `root` and return every file whose extension maps to one of
/// `languages`, sorted by relative path.
///
/// Symlinks are not followed. Relative paths always use `/`.
pub async fn scan_source_files(
    ctx: &RequestContext,
    root: &Path,
    languages: &[Language],
) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        ctx.ensure_not_cancelled("scan.source_files")?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|error| {
            ErrorEnvelope::from(error).with_metadata("path", dir.display().to_string())
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(ErrorEnvelope::from)? {
            let file_type = entry.file_type().await.map_err(ErrorEnvelope::from)?;
            let path = entry.path();
            if file_type.is_dir() {
                let skipped = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
                if !skipped {
                    pending.push(path);
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let Some(language) = Language::from_path(&path) else {
                continue;
            };
            if !languages.contains(&language) {
                continue;
            }
            let Some(relative_path) = relative_to(root, &path) else {
                continue;
            };
            files.push(SourceFile {
                absolute_path: path,
                relative_path: relative_path.into_boxed_str(),
                language,
            });
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::debug!(root = %root.display(), files = files.len(), "scanned source files");
    Ok(files)
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_shared::ErrorCode;

    #[tokio::test]
    async fn finds_requested_languages_and_skips_build_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        for (path, body) in [
            ("src/lib.rs", "pub fn a() {}"),
            ("src/nested/mod.rs", "mod x;"),
            ("chart/values.yaml", "replicas: 1"),
            ("README.md", "# readme"),
            ("target/debug/build.rs", "fn main() {}"),
            ("node_modules/pkg/index.ts", "export {}"),
            (".git/hooks/x.rs", ""),
            ("notes.txt", "plain"),
        ] {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, body)?;
        }

        let files = scan_source_files(
            &RequestContext::new_request(),
            root,
            &[Language::Rust, Language::Yaml],
        )
        .await?;
        let paths: Vec<&str> = files.iter().map(|file| &*file.relative_path).collect();
        assert_eq!(paths, vec!["chart/values.yaml", "src/lib.rs", "src/nested/mod.rs"]);
        assert_eq!(
            files.iter().map(|file| file.language).collect::<Vec<_>>(),
            vec![Language::Yaml, Language::Rust, Language::Rust]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_root_is_an_io_error() {
        let result = scan_source_files(
            &RequestContext::new_request(),
            Path::new("/definitely/not/here"),
            &Language::ALL,
        )
        .await;
        assert!(result.is_err_and(|error| error.code == ErrorCode::not_found()));
    }
}
