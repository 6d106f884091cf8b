//! Routing of chunks to their target collections.

use code_ingest_domain::{
    CodeChunk, CollectionLayout, CollectionSet, Concern, Language, METADATA_API_ENDPOINTS,
    RepoConfig,
};

const API_PATH_TOKENS: &[&str] = &[
    "api", "apis", "proto", "protos", "openapi", "swagger", "graphql", "routes", "router",
    "controllers", "controller", "handlers", "endpoints", "rpc",
];
const API_ITEM_TYPES: &[&str] = &["endpoint", "route", "handler", "rpc", "service_definition"];
const API_CONTENT_MARKERS: &[&str] = &[
    "openapi:", "swagger:", "#[get(", "#[post(", "#[put(", "#[delete(", "router.get(",
    "router.post(", "app.get(", "app.post(", "@controller",
];

const DATABASE_PATH_TOKENS: &[&str] = &[
    "migrations", "migration", "schema", "schemas", "models", "entity", "entities", "db",
    "database", "sql", "prisma",
];
const DATABASE_ITEM_TYPES: &[&str] = &["table", "model", "migration", "entity"];
const DATABASE_CONTENT_MARKERS: &[&str] = &[
    "create table", "alter table", "create index", "#[derive(queryable", "#[sea_orm(",
    "@entity",
];

const CONFIG_PATH_TOKENS: &[&str] = &[
    "config", "configs", "configuration", "settings", "conf", "env", "dotenv",
];

const DEPLOYMENT_PATH_TOKENS: &[&str] = &[
    "deploy", "deployment", "deployments", "k8s", "kubernetes", "helm", "chart", "charts",
    "manifests", "kustomize", "kustomization", "dockerfile", "workflows", "argocd",
];
const HELM_PATH_MARKERS: &[&str] = &["helm", "chart", "values"];

/// Pure, deterministic mapping from a chunk to its ordered collection set.
///
/// Order is language, service, then concerns in the fixed order api
/// contracts, database schemas, config, deployment. Duplicate names keep their
/// first position.
#[derive(Debug, Clone, Default)]
pub struct CollectionAssigner {
    layout: CollectionLayout,
}

impl CollectionAssigner {
    /// Assigner over a collection layout.
    #[must_use]
    pub const fn new(layout: CollectionLayout) -> Self {
        Self { layout }
    }

    /// The layout names are resolved against.
    #[must_use]
    pub const fn layout(&self) -> &CollectionLayout {
        &self.layout
    }

    /// Target collections for a chunk of `repo` ingested as `language`.
    #[must_use]
    pub fn target_collections(
        &self,
        chunk: &CodeChunk,
        repo: &RepoConfig,
        language: Language,
    ) -> CollectionSet {
        let mut set = CollectionSet::new(self.layout.language(language));
        if let Some(bucket) = repo.repo_type.service_bucket() {
            set.push(self.layout.service(bucket));
        }
        for concern in concerns(chunk, repo, language) {
            set.push(self.layout.concern(concern));
        }
        set
    }
}

/// Concerns a chunk belongs to, in routing order.
#[must_use]
pub fn concerns(chunk: &CodeChunk, repo: &RepoConfig, language: Language) -> Vec<Concern> {
    let path = chunk.file_path().to_ascii_lowercase();
    let tokens = path_tokens(&path);
    let item_type = chunk.item_type().to_ascii_lowercase();
    let content = chunk.content().to_ascii_lowercase();

    let has_token = |vocabulary: &[&str]| tokens.iter().any(|token| vocabulary.contains(token));
    let has_marker = |markers: &[&str]| markers.iter().any(|marker| content.contains(marker));

    let api = has_token(API_PATH_TOKENS)
        || path.ends_with(".proto")
        || API_ITEM_TYPES.contains(&item_type.as_str())
        || has_marker(API_CONTENT_MARKERS)
        || chunk
            .metadata()
            .get(METADATA_API_ENDPOINTS)
            .is_some_and(|endpoints| endpoints.as_array().is_some_and(|list| !list.is_empty()));

    let database = has_token(DATABASE_PATH_TOKENS)
        || path.ends_with(".sql")
        || DATABASE_ITEM_TYPES.contains(&item_type.as_str())
        || has_marker(DATABASE_CONTENT_MARKERS);

    let config = has_token(CONFIG_PATH_TOKENS);

    let helm_forced =
        repo.has_helm && HELM_PATH_MARKERS.iter().any(|marker| path.contains(marker));
    let kubernetes_manifest =
        language == Language::Yaml && content.contains("apiversion:") && content.contains("kind:");
    let deployment = helm_forced
        || has_token(DEPLOYMENT_PATH_TOKENS)
        || language == Language::Terraform
        || kubernetes_manifest;

    Concern::ALL
        .into_iter()
        .zip([api, database, config, deployment])
        .filter_map(|(concern, matched)| matched.then_some(concern))
        .collect()
}

fn path_tokens(path: &str) -> Vec<&str> {
    path.split(['/', '\\', '.', '-', '_'])
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_ingest_domain::{CollectionName, LineSpan, RepoId, RepoType};
    use code_ingest_shared::{ErrorEnvelope, Result};
    use proptest::prelude::*;

    fn chunk(path: &str, language: Language, content: &str) -> Result<CodeChunk> {
        let span = LineSpan::new(1, 1).map_err(ErrorEnvelope::from)?;
        CodeChunk::new(path, language, span, content).map_err(ErrorEnvelope::from)
    }

    fn repo(repo_type: RepoType, has_helm: bool) -> Result<RepoConfig> {
        let id = RepoId::parse("svc").map_err(ErrorEnvelope::from)?;
        Ok(RepoConfig::new(id, repo_type).with_helm(has_helm))
    }

    fn names(set: &CollectionSet) -> Vec<&str> {
        set.iter().map(CollectionName::as_str).collect()
    }

    #[test]
    fn helm_values_route_to_language_service_and_deployment() -> Result<()> {
        let assigner = CollectionAssigner::default();
        let layout = assigner.layout();
        let chunk = chunk("helm/values.yaml", Language::Yaml, "replicaCount: 2")?;

        let set = assigner.target_collections(&chunk, &repo(RepoType::Backend, true)?, Language::Yaml);

        assert_eq!(
            set.as_slice(),
            &[
                layout.language(Language::Yaml),
                layout.service(code_ingest_domain::ServiceBucket::Backend),
                layout.concern(Concern::Deployment),
            ]
        );
        Ok(())
    }

    #[test]
    fn library_repos_have_no_service_collection() -> Result<()> {
        let assigner = CollectionAssigner::default();
        let chunk = chunk("src/lib.rs", Language::Rust, "pub fn add() {}")?;
        let set = assigner.target_collections(&chunk, &repo(RepoType::Library, false)?, Language::Rust);
        assert_eq!(names(&set), vec![assigner.layout().language(Language::Rust).as_str()]);
        Ok(())
    }

    #[test]
    fn concerns_follow_fixed_order() -> Result<()> {
        let chunk = chunk(
            "deploy/config/api/migrations/001.sql",
            Language::Yaml,
            "CREATE TABLE users (id int);",
        )?;
        let found = concerns(&chunk, &repo(RepoType::Backend, false)?, Language::Yaml);
        assert_eq!(found, Concern::ALL.to_vec());
        Ok(())
    }

    #[test]
    fn helm_markers_need_a_helm_repo() -> Result<()> {
        let chunk = chunk("values.yaml", Language::Yaml, "replicaCount: 2")?;
        assert!(concerns(&chunk, &repo(RepoType::Backend, false)?, Language::Yaml).is_empty());
        assert_eq!(
            concerns(&chunk, &repo(RepoType::Backend, true)?, Language::Yaml),
            vec![Concern::Deployment]
        );
        Ok(())
    }

    #[test]
    fn shared_collection_names_are_not_duplicated() -> Result<()> {
        let shared = CollectionName::parse("everything").map_err(ErrorEnvelope::from)?;
        let layout = CollectionLayout::default()
            .with_language(Language::Terraform, shared.clone())
            .with_service(code_ingest_domain::ServiceBucket::Infrastructure, shared.clone())
            .with_concern(Concern::Deployment, shared);
        let assigner = CollectionAssigner::new(layout);
        let chunk = chunk("main.tf", Language::Terraform, "resource \"x\" \"y\" {}")?;

        let set = assigner.target_collections(
            &chunk,
            &repo(RepoType::Infrastructure, false)?,
            Language::Terraform,
        );
        assert_eq!(names(&set), vec!["everything"]);
        Ok(())
    }

    proptest! {
        #[test]
        fn routing_is_deterministic_and_starts_with_language(
            path in "[a-z]{1,8}(/[a-z_]{1,8}){0,3}\\.(rs|yaml|tf|md)",
            content in "[ -~]{0,64}",
            has_helm in any::<bool>(),
            type_index in 0usize..RepoType::ALL.len(),
        ) {
            let language = Language::from_path(std::path::Path::new(&path)).unwrap_or(Language::Rust);
            let repo_type = RepoType::ALL.get(type_index).copied().unwrap_or(RepoType::Backend);
            let chunk = chunk(&path, language, &content).map_err(|error| TestCaseError::fail(error.to_string()))?;
            let repo = repo(repo_type, has_helm).map_err(|error| TestCaseError::fail(error.to_string()))?;
            let assigner = CollectionAssigner::default();

            let first = assigner.target_collections(&chunk, &repo, language);
            let second = assigner.target_collections(&chunk, &repo, language);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.primary(), &assigner.layout().language(language));
            prop_assert_eq!(first.as_slice().first(), Some(first.primary()));
        }
    }
}
