//! Domain primitives with validated constructors.

use code_ingest_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// `RepoId` is empty after trimming.
    #[error("RepoId must be non-empty")]
    InvalidRepoId {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `CollectionName` is empty after trimming.
    #[error("CollectionName must be non-empty")]
    EmptyCollectionName {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `CollectionName` violates the allowed pattern.
    #[error("CollectionName must match /^[a-zA-Z][a-zA-Z0-9_]*$/")]
    InvalidCollectionName {
        /// Trimmed collection name that failed validation.
        input: String,
    },
    /// A collection set was built without any collection.
    #[error("CollectionSet must contain at least one collection")]
    EmptyCollectionSet,
    /// Chunk file path is empty after trimming.
    #[error("chunk file_path must be non-empty")]
    EmptyFilePath,
    /// `LineSpan` start/end must be >= 1.
    #[error("LineSpan start_line/end_line must be >= 1")]
    LineSpanNonPositive {
        /// Starting line (1-indexed).
        start_line: u32,
        /// Ending line (1-indexed).
        end_line: u32,
    },
    /// `LineSpan` start must be <= end.
    #[error("LineSpan start_line must be <= end_line")]
    LineSpanStartAfterEnd {
        /// Starting line (1-indexed).
        start_line: u32,
        /// Ending line (1-indexed).
        end_line: u32,
    },
    /// Language identifier is not one of the supported languages.
    #[error("unsupported language: {input}")]
    UnknownLanguage {
        /// Raw language identifier.
        input: String,
    },
    /// Repository type identifier is not recognized.
    #[error("unsupported repo type: {input}")]
    UnknownRepoType {
        /// Raw repo type identifier.
        input: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidRepoId { .. } => ErrorCode::new("domain", "invalid_repo_id"),
            Self::EmptyCollectionName { .. } | Self::InvalidCollectionName { .. } => {
                ErrorCode::new("domain", "invalid_collection_name")
            },
            Self::EmptyCollectionSet => ErrorCode::new("domain", "empty_collection_set"),
            Self::EmptyFilePath => ErrorCode::new("domain", "invalid_file_path"),
            Self::LineSpanNonPositive { .. } | Self::LineSpanStartAfterEnd { .. } => {
                ErrorCode::new("domain", "invalid_line_span")
            },
            Self::UnknownLanguage { .. } => ErrorCode::new("domain", "unknown_language"),
            Self::UnknownRepoType { .. } => ErrorCode::new("domain", "unknown_repo_type"),
        }
    }
}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());

        match error {
            PrimitiveError::InvalidRepoId { input_length }
            | PrimitiveError::EmptyCollectionName { input_length } => {
                envelope.with_metadata("input_length", input_length.to_string())
            },
            PrimitiveError::InvalidCollectionName { input }
            | PrimitiveError::UnknownLanguage { input }
            | PrimitiveError::UnknownRepoType { input } => envelope.with_metadata("input", input),
            PrimitiveError::LineSpanNonPositive {
                start_line,
                end_line,
            }
            | PrimitiveError::LineSpanStartAfterEnd {
                start_line,
                end_line,
            } => envelope
                .with_metadata("start_line", start_line.to_string())
                .with_metadata("end_line", end_line.to_string()),
            PrimitiveError::EmptyCollectionSet | PrimitiveError::EmptyFilePath => envelope,
        }
    }
}

/// Identifier for a configured repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId(Box<str>);

impl RepoId {
    /// Parse a `RepoId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::InvalidRepoId {
                input_length: raw.len(),
            });
        };

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoId {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.0.into_string()
    }
}

impl AsRef<str> for RepoId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier for a vector collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(Box<str>);

impl CollectionName {
    /// Parse a collection name that satisfies the allowlist pattern.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(PrimitiveError::EmptyCollectionName {
                input_length: raw.len(),
            });
        };

        if !is_valid_collection_name(trimmed) {
            return Err(PrimitiveError::InvalidCollectionName {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Built-in names are literals checked by the layout tests.
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(Box::from(name))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CollectionName {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0.into_string()
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Deterministic identifier of a stored vector record.
///
/// Rendered as a UUID string so that every backend accepts it as a point id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Box<str>);

impl RecordId {
    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    /// Wrap an id returned by a backend.
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Derive the record id for a chunk location.
///
/// The id is the sha-256 of `file_path:item_name:start_line`, truncated to 16
/// bytes and formatted as a UUID. Content is not part of the key, so a changed
/// chunk at the same location overwrites its previous record.
#[must_use]
pub fn derive_record_id(file_path: &str, item_name: &str, start_line: u32) -> RecordId {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b":");
    hasher.update(item_name.as_bytes());
    hasher.update(b":");
    hasher.update(start_line.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    for (slot, byte) in bytes.iter_mut().zip(digest.iter()) {
        *slot = *byte;
    }
    let uuid = uuid::Uuid::from_bytes(bytes);
    RecordId(uuid.hyphenated().to_string().into_boxed_str())
}

pub(crate) fn trimmed_non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn is_valid_collection_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() {
        return false;
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
