//! Chunk extraction boundary contract.

use crate::BoxFuture;
use code_ingest_domain::{CodeChunk, Language};
use code_ingest_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A source file handed to an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub absolute_path: PathBuf,
    /// Repository-relative path, `/`-separated; used as the chunk file path.
    pub relative_path: Box<str>,
    /// Detected language.
    pub language: Language,
}

/// Produces chunks for one language.
pub trait ChunkExtractor: Send + Sync {
    /// Language handled by this extractor.
    fn language(&self) -> Language;

    /// Read and split a file into chunks.
    fn extract(
        &self,
        ctx: &RequestContext,
        file: SourceFile,
    ) -> BoxFuture<'_, Result<Vec<CodeChunk>>>;
}

/// Dispatches extraction by language.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<Language, Arc<dyn ChunkExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor under its own language, replacing any previous one.
    #[must_use]
    pub fn with(mut self, extractor: Arc<dyn ChunkExtractor>) -> Self {
        self.extractors.insert(extractor.language(), extractor);
        self
    }

    /// Extractor for a language, if registered.
    #[must_use]
    pub fn get(&self, language: Language) -> Option<&Arc<dyn ChunkExtractor>> {
        self.extractors.get(&language)
    }

    /// Languages with a registered extractor.
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.extractors.keys().copied()
    }

    /// Extract chunks from a file with the extractor of its language.
    pub async fn extract(&self, ctx: &RequestContext, file: SourceFile) -> Result<Vec<CodeChunk>> {
        let Some(extractor) = self.get(file.language) else {
            return Err(ErrorEnvelope::expected(
                ErrorCode::new("extract", "no_extractor"),
                format!("no extractor registered for {}", file.language),
            )
            .with_metadata("language", file.language.as_str()));
        };
        extractor.extract(ctx, file).await
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ExtractorRegistry")
            .field("languages", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_domain::LineSpan;

    struct OneChunk;

    impl ChunkExtractor for OneChunk {
        fn language(&self) -> Language {
            Language::Markdown
        }

        fn extract(
            &self,
            _ctx: &RequestContext,
            file: SourceFile,
        ) -> BoxFuture<'_, Result<Vec<CodeChunk>>> {
            Box::pin(async move {
                let span = LineSpan::new(1, 1).map_err(ErrorEnvelope::from)?;
                let chunk = CodeChunk::new(file.relative_path, file.language, span, "# title")
                    .map_err(ErrorEnvelope::from)?;
                Ok(vec![chunk])
            })
        }
    }

    fn file(language: Language) -> SourceFile {
        SourceFile {
            absolute_path: PathBuf::from("/repo/README.md"),
            relative_path: Box::from("README.md"),
            language,
        }
    }

    #[tokio::test]
    async fn dispatches_on_language() -> Result<()> {
        let registry = ExtractorRegistry::new().with(Arc::new(OneChunk));
        let ctx = RequestContext::new_request();

        let chunks = registry.extract(&ctx, file(Language::Markdown)).await?;
        assert_eq!(chunks.len(), 1);

        let missing = registry.extract(&ctx, file(Language::Rust)).await;
        assert!(missing.is_err_and(|error| error.code.code() == "no_extractor"));
        Ok(())
    }
}
