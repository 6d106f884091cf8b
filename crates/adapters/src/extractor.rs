//! Line-window chunk extractor.

use code_ingest_domain::DEFAULT_ITEM_TYPE;
use code_ingest_ports::{
    BoxFuture, ChunkExtractor, CodeChunk, Language, LineSpan, SourceFile,
};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::path::Path;

/// Default number of lines per window.
pub const DEFAULT_WINDOW_LINES: u32 = 80;

/// Splits a file into consecutive fixed-size line windows.
///
/// Windows that contain only whitespace are skipped. Each chunk is named after
/// the file stem so record ids stay stable across runs.
#[derive(Debug, Clone, Copy)]
pub struct LineWindowExtractor {
    language: Language,
    window_lines: u32,
}

impl LineWindowExtractor {
    /// Extractor for `language` with `window_lines` lines per chunk.
    pub fn new(language: Language, window_lines: u32) -> Result<Self> {
        if window_lines == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "window_lines must be greater than zero",
            ));
        }
        Ok(Self {
            language,
            window_lines,
        })
    }

    /// Split already-loaded text into chunks for `relative_path`.
    pub fn split(&self, relative_path: &str, text: &str) -> Result<Vec<CodeChunk>> {
        let item_name = Path::new(relative_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(relative_path)
            .to_owned();
        let lines: Vec<&str> = text.lines().collect();
        let window = usize::try_from(self.window_lines).unwrap_or(usize::MAX);

        let mut chunks = Vec::new();
        let mut start = 1u32;
        for window_lines in lines.chunks(window) {
            let count = u32::try_from(window_lines.len()).unwrap_or(u32::MAX);
            let end = start.saturating_add(count).saturating_sub(1);
            if window_lines.iter().any(|line| !line.trim().is_empty()) {
                let span = LineSpan::new(start, end).map_err(ErrorEnvelope::from)?;
                let chunk = CodeChunk::new(relative_path, self.language, span, window_lines.join("\n"))
                    .map_err(ErrorEnvelope::from)?
                    .with_item(item_name.as_str(), DEFAULT_ITEM_TYPE);
                chunks.push(chunk);
            }
            start = end.saturating_add(1);
        }
        Ok(chunks)
    }
}

impl ChunkExtractor for LineWindowExtractor {
    fn language(&self) -> Language {
        self.language
    }

    fn extract(
        &self,
        ctx: &RequestContext,
        file: SourceFile,
    ) -> BoxFuture<'_, Result<Vec<CodeChunk>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("line_window.extract")?;
            let bytes = tokio::fs::read(&file.absolute_path).await.map_err(|error| {
                ErrorEnvelope::from(error).with_metadata("path", &*file.relative_path)
            })?;
            let text = String::from_utf8_lossy(&bytes);
            self.split(&file.relative_path, &text)
        })
    }
}
