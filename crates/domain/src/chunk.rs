//! The unit of indexable content produced by extractors.

use crate::language::Language;
use crate::primitives::{PrimitiveError, RecordId, derive_record_id, trimmed_non_empty};
use crate::spans::LineSpan;
use serde_json::Value;
use std::collections::BTreeMap;

/// Open metadata attached to a chunk by its extractor.
pub type ChunkMetadata = BTreeMap<String, Value>;

/// Metadata key holding the business domain of a chunk.
pub const METADATA_BUSINESS_DOMAIN: &str = "business_domain";
/// Metadata key holding the imports referenced by a chunk.
pub const METADATA_IMPORTS: &str = "imports";
/// Metadata key holding the API endpoints declared by a chunk.
pub const METADATA_API_ENDPOINTS: &str = "api_endpoints";

/// Item type used when an extractor does not classify the chunk.
pub const DEFAULT_ITEM_TYPE: &str = "block";

/// One indexable unit of source content.
///
/// Chunks are immutable once built. The batch that owns a chunk moves it into
/// storage; nothing else holds a mutable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeChunk {
    file_path: Box<str>,
    content: Box<str>,
    span: LineSpan,
    item_name: Box<str>,
    item_type: Box<str>,
    language: Language,
    metadata: ChunkMetadata,
}

impl CodeChunk {
    /// Build a chunk for a file location.
    ///
    /// The item name defaults to empty and the item type to [`DEFAULT_ITEM_TYPE`].
    pub fn new(
        file_path: impl AsRef<str>,
        language: Language,
        span: LineSpan,
        content: impl Into<Box<str>>,
    ) -> Result<Self, PrimitiveError> {
        let Some(file_path) = trimmed_non_empty(file_path.as_ref()) else {
            return Err(PrimitiveError::EmptyFilePath);
        };

        Ok(Self {
            file_path: Box::from(file_path),
            content: content.into(),
            span,
            item_name: Box::from(""),
            item_type: Box::from(DEFAULT_ITEM_TYPE),
            language,
            metadata: ChunkMetadata::new(),
        })
    }

    /// Name and classify the item this chunk covers (function, struct, resource, ...).
    #[must_use]
    pub fn with_item(mut self, item_name: impl Into<Box<str>>, item_type: impl Into<Box<str>>) -> Self {
        self.item_name = item_name.into();
        self.item_type = item_type.into();
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Repository-relative path of the source file.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Chunk text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Size of the content in characters.
    #[must_use]
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// Line span covered by the chunk.
    #[must_use]
    pub const fn span(&self) -> LineSpan {
        self.span
    }

    /// First line (1-indexed).
    #[must_use]
    pub const fn start_line(&self) -> u32 {
        self.span.start_line()
    }

    /// Last line (1-indexed).
    #[must_use]
    pub const fn end_line(&self) -> u32 {
        self.span.end_line()
    }

    /// Name of the covered item; empty for anonymous windows.
    #[must_use]
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    /// Kind of the covered item.
    #[must_use]
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// Source language.
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Extractor-provided metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// Business domain tag, when the extractor or repository provided one.
    #[must_use]
    pub fn business_domain(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_BUSINESS_DOMAIN)
            .and_then(Value::as_str)
            .filter(|domain| !domain.trim().is_empty())
    }

    /// Deterministic id of the record this chunk is stored under.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        derive_record_id(&self.file_path, &self.item_name, self.start_line())
    }
}
