//! Collection naming and the resolved target set of a chunk.

use crate::language::Language;
use crate::primitives::{CollectionName, PrimitiveError};
use crate::repo::ServiceBucket;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Architectural concern a chunk can be classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    /// HTTP/RPC interfaces, schemas of requests and responses.
    ApiContracts,
    /// Migrations, ORM models, SQL.
    DatabaseSchemas,
    /// Runtime configuration.
    Config,
    /// Deployment manifests, charts, pipelines.
    Deployment,
}

impl Concern {
    /// Every concern, in routing order.
    pub const ALL: [Self; 4] = [
        Self::ApiContracts,
        Self::DatabaseSchemas,
        Self::Config,
        Self::Deployment,
    ];

    /// Returns the canonical string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiContracts => "api_contracts",
            Self::DatabaseSchemas => "database_schemas",
            Self::Config => "config",
            Self::Deployment => "deployment",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Ordered, de-duplicated, non-empty list of target collections.
///
/// The first entry is always the language collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionSet {
    primary: CollectionName,
    names: Vec<CollectionName>,
}

impl CollectionSet {
    /// Start a set with its primary (language) collection.
    #[must_use]
    pub fn new(primary: CollectionName) -> Self {
        Self {
            names: vec![primary.clone()],
            primary,
        }
    }

    /// Build a set from names, dropping later duplicates.
    pub fn from_names(
        names: impl IntoIterator<Item = CollectionName>,
    ) -> Result<Self, PrimitiveError> {
        let mut names = names.into_iter();
        let Some(primary) = names.next() else {
            return Err(PrimitiveError::EmptyCollectionSet);
        };
        let mut set = Self::new(primary);
        for name in names {
            set.push(name);
        }
        Ok(set)
    }

    /// Append a collection unless already present. Returns true when appended.
    pub fn push(&mut self, name: CollectionName) -> bool {
        if self.names.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    /// The primary (language) collection.
    #[must_use]
    pub const fn primary(&self) -> &CollectionName {
        &self.primary
    }

    /// Returns true when the set contains `name`.
    #[must_use]
    pub fn contains(&self, name: &CollectionName) -> bool {
        self.names.contains(name)
    }

    /// Collections in routing order.
    #[must_use]
    pub fn as_slice(&self) -> &[CollectionName] {
        &self.names
    }

    /// Iterate collections in routing order.
    pub fn iter(&self) -> std::slice::Iter<'_, CollectionName> {
        self.names.iter()
    }

    /// Number of collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: a set holds at least its primary collection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> IntoIterator for &'a CollectionSet {
    type Item = &'a CollectionName;
    type IntoIter = std::slice::Iter<'a, CollectionName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

/// Maps languages, service buckets and concerns to collection names.
///
/// Unset entries fall back to the built-in names (`rust_code`,
/// `backend_services`, `deployment_configs`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionLayout {
    languages: BTreeMap<Language, CollectionName>,
    services: BTreeMap<ServiceBucket, CollectionName>,
    concerns: BTreeMap<Concern, CollectionName>,
}

impl CollectionLayout {
    /// Override the collection of a language.
    #[must_use]
    pub fn with_language(mut self, language: Language, name: CollectionName) -> Self {
        self.languages.insert(language, name);
        self
    }

    /// Override the collection of a service bucket.
    #[must_use]
    pub fn with_service(mut self, bucket: ServiceBucket, name: CollectionName) -> Self {
        self.services.insert(bucket, name);
        self
    }

    /// Override the collection of a concern.
    #[must_use]
    pub fn with_concern(mut self, concern: Concern, name: CollectionName) -> Self {
        self.concerns.insert(concern, name);
        self
    }

    /// Collection for a language.
    #[must_use]
    pub fn language(&self, language: Language) -> CollectionName {
        self.languages
            .get(&language)
            .cloned()
            .unwrap_or_else(|| CollectionName::from_static(default_language_collection(language)))
    }

    /// Collection for a service bucket.
    #[must_use]
    pub fn service(&self, bucket: ServiceBucket) -> CollectionName {
        self.services
            .get(&bucket)
            .cloned()
            .unwrap_or_else(|| CollectionName::from_static(default_service_collection(bucket)))
    }

    /// Collection for a concern.
    #[must_use]
    pub fn concern(&self, concern: Concern) -> CollectionName {
        self.concerns
            .get(&concern)
            .cloned()
            .unwrap_or_else(|| CollectionName::from_static(default_concern_collection(concern)))
    }

    /// Every collection in the layout, de-duplicated, languages first.
    #[must_use]
    pub fn all(&self) -> Vec<CollectionName> {
        let mut names: Vec<CollectionName> = Vec::new();
        let candidates = Language::ALL
            .into_iter()
            .map(|language| self.language(language))
            .chain(ServiceBucket::ALL.into_iter().map(|bucket| self.service(bucket)))
            .chain(Concern::ALL.into_iter().map(|concern| self.concern(concern)));
        for name in candidates {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

const fn default_language_collection(language: Language) -> &'static str {
    match language {
        Language::Rust => "rust_code",
        Language::TypeScript => "typescript_code",
        Language::Solidity => "solidity_code",
        Language::Yaml => "yaml_configs",
        Language::Terraform => "terraform_infra",
        Language::Markdown => "markdown_docs",
    }
}

const fn default_service_collection(bucket: ServiceBucket) -> &'static str {
    match bucket {
        ServiceBucket::Frontend => "frontend_services",
        ServiceBucket::Backend => "backend_services",
        ServiceBucket::Middleware => "middleware_services",
        ServiceBucket::Infrastructure => "infrastructure_services",
        ServiceBucket::Documentation => "documentation_services",
    }
}

const fn default_concern_collection(concern: Concern) -> &'static str {
    match concern {
        Concern::ApiContracts => "api_contracts",
        Concern::DatabaseSchemas => "database_schemas",
        Concern::Config => "config_files",
        Concern::Deployment => "deployment_configs",
    }
}
