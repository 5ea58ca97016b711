//! OCI distribution dialect.
//!
//! Speaks the distribution spec against registries that allow anonymous
//! reads: `/v2/_catalog` for the corpus, `/v2/{name}/tags/list` for
//! versions. Tags carry no release timestamps, so chronological order
//! falls back to the tag comparator.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use prism_cache::FetchError;
use prism_cache::HttpCache;
use prism_core::RegistryMeta;
use prism_core::constants::CORPUS_TTL;
use prism_core::constants::PACKAGE_TTL;

use super::Ecosystem;
use super::PackageModel;
use super::VersionModel;
use super::versions::numeric_lexical_cmp;

const META: RegistryMeta = RegistryMeta {
    registry_id: "oci-wrapper",
    group_plural: "containerregistries",
    group_singular: "containerregistry",
    resource_plural: "images",
    resource_singular: "image",
};

/// Repositories requested from `_catalog`.
const CATALOG_PAGE: usize = 1000;

/// The OCI distribution dialect.
pub struct OciEcosystem {
    upstream: String,
    group_id: String,
}

impl OciEcosystem {
    /// Dialect against the Docker Hub registry endpoint.
    pub fn new() -> Self {
        Self::with_upstream("https://registry-1.docker.io", "docker.io")
    }

    /// Dialect against an explicit registry (tests, private registries).
    pub fn with_upstream(upstream: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into().trim_end_matches('/').to_string(),
            group_id: group_id.into(),
        }
    }
}

impl Default for OciEcosystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ecosystem for OciEcosystem {
    fn meta(&self) -> &RegistryMeta {
        &META
    }

    fn group_id(&self) -> &str {
        &self.group_id
    }

    fn upstream_base(&self) -> &str {
        &self.upstream
    }

    /// Repository names are already canonical per the distribution spec.
    fn normalize(&self, id: &str) -> String {
        id.trim().to_string()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        numeric_lexical_cmp(a, b)
    }

    async fn load_corpus(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/v2/_catalog?n={CATALOG_PAGE}", self.upstream);
        let catalog = cache.fetch_json(&url, CORPUS_TTL).await?;
        let repositories = catalog
            .get("repositories")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed {
                url: url.clone(),
                message: "missing 'repositories' array in catalog".to_string(),
            })?;
        Ok(repositories
            .iter()
            .filter_map(Value::as_str)
            .map(|name| self.normalize(name))
            .collect())
    }

    /// The distribution spec has no search endpoint; filter the catalog.
    async fn search(
        &self,
        cache: &Arc<HttpCache>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        let names = self.load_corpus(cache).await?;
        Ok(names.into_iter().filter(|n| n.contains(term)).take(limit).collect())
    }

    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError> {
        let name = self.normalize(id);
        let url = format!("{}/v2/{name}/tags/list", self.upstream);
        let listing = cache.fetch_json(&url, PACKAGE_TTL).await?;

        let tags = listing
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        let versions: Vec<VersionModel> = tags
            .iter()
            .map(|tag| VersionModel {
                version: tag.to_string(),
                released_at: None,
                attributes: Map::new(),
            })
            .collect();

        // `latest` is the conventional stable pointer; otherwise the
        // greatest tag under the comparator
        let default_version = if tags.contains(&"latest") {
            Some("latest".to_string())
        } else {
            tags.iter().max_by(|a, b| numeric_lexical_cmp(a, b)).map(|t| t.to_string())
        };

        Ok(PackageModel {
            normalized: name.clone(),
            name,
            default_version,
            versions,
            attributes: Map::new(),
        })
    }
}
