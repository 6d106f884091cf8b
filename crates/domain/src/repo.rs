//! Repository classification used for routing and scheduling.

use crate::language::Language;
use crate::primitives::{PrimitiveError, RepoId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of system a repository contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoType {
    /// User-facing web or mobile applications.
    Frontend,
    /// Backend services.
    Backend,
    /// Gateways, proxies and message brokers.
    Middleware,
    /// Model Context Protocol servers.
    McpServer,
    /// Infrastructure as code and platform repos.
    Infrastructure,
    /// Developer tooling and scripts.
    Tool,
    /// Documentation sites and handbooks.
    Documentation,
    /// Shared libraries.
    Library,
}

impl RepoType {
    /// Every repo type, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Frontend,
        Self::Backend,
        Self::Middleware,
        Self::McpServer,
        Self::Infrastructure,
        Self::Tool,
        Self::Documentation,
        Self::Library,
    ];

    /// Returns the canonical string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Middleware => "middleware",
            Self::McpServer => "mcp_server",
            Self::Infrastructure => "infrastructure",
            Self::Tool => "tool",
            Self::Documentation => "documentation",
            Self::Library => "library",
        }
    }

    /// Service bucket this repo type is stored under, if any.
    ///
    /// Several repo types share a bucket; libraries have none.
    #[must_use]
    pub const fn service_bucket(self) -> Option<ServiceBucket> {
        match self {
            Self::Frontend => Some(ServiceBucket::Frontend),
            Self::Backend => Some(ServiceBucket::Backend),
            Self::Middleware | Self::McpServer => Some(ServiceBucket::Middleware),
            Self::Infrastructure | Self::Tool => Some(ServiceBucket::Infrastructure),
            Self::Documentation => Some(ServiceBucket::Documentation),
            Self::Library => None,
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = PrimitiveError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|repo_type| repo_type.as_str() == normalized)
            .ok_or_else(|| PrimitiveError::UnknownRepoType {
                input: input.to_owned(),
            })
    }
}

/// Service collection bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceBucket {
    /// Frontend services.
    Frontend,
    /// Backend services.
    Backend,
    /// Middleware and MCP servers.
    Middleware,
    /// Infrastructure and tooling.
    Infrastructure,
    /// Documentation.
    Documentation,
}

impl ServiceBucket {
    /// Every bucket, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Frontend,
        Self::Backend,
        Self::Middleware,
        Self::Infrastructure,
        Self::Documentation,
    ];

    /// Returns the canonical string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Middleware => "middleware",
            Self::Infrastructure => "infrastructure",
            Self::Documentation => "documentation",
        }
    }
}

/// Scheduling priority of a repository; higher priority repos ingest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Ingest first.
    High,
    /// Default priority.
    #[default]
    Medium,
    /// Ingest last.
    Low,
}

/// Classification of one repository to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Stable repository identifier.
    pub repo_id: RepoId,
    /// Repository kind.
    pub repo_type: RepoType,
    /// Languages to ingest, in order.
    pub languages: Vec<Language>,
    /// Whether the repository ships Helm charts.
    pub has_helm: bool,
    /// Other repositories this service calls.
    pub service_dependencies: Vec<String>,
    /// Scheduling priority.
    pub priority: Priority,
    /// Business domain applied to chunks that carry none.
    pub business_domain: Option<String>,
}

impl RepoConfig {
    /// Minimal configuration for a repository of the given type.
    #[must_use]
    pub const fn new(repo_id: RepoId, repo_type: RepoType) -> Self {
        Self {
            repo_id,
            repo_type,
            languages: Vec::new(),
            has_helm: false,
            service_dependencies: Vec::new(),
            priority: Priority::Medium,
            business_domain: None,
        }
    }

    /// Replace the ingested languages.
    #[must_use]
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().collect();
        self
    }

    /// Mark the repository as shipping Helm charts.
    #[must_use]
    pub const fn with_helm(mut self, has_helm: bool) -> Self {
        self.has_helm = has_helm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_mapping_is_many_to_one() {
        assert_eq!(
            RepoType::McpServer.service_bucket(),
            RepoType::Middleware.service_bucket()
        );
        assert_eq!(
            RepoType::Tool.service_bucket(),
            Some(ServiceBucket::Infrastructure)
        );
        assert_eq!(RepoType::Library.service_bucket(), None);
    }

    #[test]
    fn repo_type_parses_kebab_and_snake_case() -> Result<(), PrimitiveError> {
        assert_eq!("mcp-server".parse::<RepoType>()?, RepoType::McpServer);
        assert_eq!("MCP_SERVER".parse::<RepoType>()?, RepoType::McpServer);
        assert!("mainframe".parse::<RepoType>().is_err());
        Ok(())
    }

    #[test]
    fn priorities_order_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }
}
