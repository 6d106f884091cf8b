//! Closed set of languages the pipeline ingests.

use crate::primitives::PrimitiveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Canonical language identifiers derived from file extensions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// `Rust` source files.
    Rust,
    /// `TypeScript` source files (including `tsx`).
    TypeScript,
    /// `Solidity` contracts.
    Solidity,
    /// `YAML` documents (manifests, Helm values, CI).
    Yaml,
    /// `Terraform` / HCL modules.
    Terraform,
    /// `Markdown` documents.
    Markdown,
}

impl Language {
    /// Every supported language, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Rust,
        Self::TypeScript,
        Self::Solidity,
        Self::Yaml,
        Self::Terraform,
        Self::Markdown,
    ];

    /// Returns the canonical string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::Solidity => "solidity",
            Self::Yaml => "yaml",
            Self::Terraform => "terraform",
            Self::Markdown => "markdown",
        }
    }

    /// Derive a language identifier from a file extension (without the dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "sol" => Some(Self::Solidity),
            "yaml" | "yml" => Some(Self::Yaml),
            "tf" | "tfvars" | "hcl" => Some(Self::Terraform),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Derive a language identifier from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = PrimitiveError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| language.as_str() == normalized)
            .ok_or_else(|| PrimitiveError::UnknownLanguage {
                input: input.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_languages() {
        assert_eq!(Language::from_extension("RS"), Some(Language::Rust));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("yml"), Some(Language::Yaml));
        assert_eq!(Language::from_extension("tfvars"), Some(Language::Terraform));
        assert_eq!(Language::from_extension("py"), None);
    }

    #[test]
    fn parse_round_trips_canonical_names() -> Result<(), PrimitiveError> {
        for language in Language::ALL {
            assert_eq!(language.as_str().parse::<Language>()?, language);
        }
        assert!("cobol".parse::<Language>().is_err());
        Ok(())
    }

    #[test]
    fn from_path_uses_extension() {
        assert_eq!(
            Language::from_path(Path::new("charts/api/values.yaml")),
            Some(Language::Yaml)
        );
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }
}
