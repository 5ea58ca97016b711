//! Maven Central dialect.
//!
//! Speaks the Central search API (`solrsearch/select`). Package
//! identifiers are `group:artifact` coordinates; version lists come from
//! the `gav` core, ordered by the Maven version comparator.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use prism_cache::FetchError;
use prism_cache::HttpCache;
use prism_core::RegistryMeta;
use prism_core::constants::CORPUS_TTL;
use prism_core::constants::PACKAGE_TTL;
use prism_core::constants::SEARCH_TTL;

use super::Ecosystem;
use super::PackageModel;
use super::VersionModel;
use super::npm::urlencode;
use super::versions::maven_cmp;

const META: RegistryMeta = RegistryMeta {
    registry_id: "maven-wrapper",
    group_plural: "javaregistries",
    group_singular: "javaregistry",
    resource_plural: "packages",
    resource_singular: "package",
};

/// Versions requested per coordinate lookup.
const MAX_GAV_ROWS: usize = 200;

/// Rows requested for the boot-time corpus.
///
/// Central has no full listing; the corpus is the most-recently-updated
/// slice the search API will hand out, so index-backed queries cover the
/// hot tail and everything else reaches the search fallback.
const CORPUS_ROWS: usize = 200;

/// The Maven Central dialect.
pub struct MavenEcosystem {
    search_base: String,
}

impl MavenEcosystem {
    /// Dialect against search.maven.org.
    pub fn new() -> Self {
        Self::with_upstream("https://search.maven.org")
    }

    /// Dialect against an explicit endpoint (tests, mirrors).
    pub fn with_upstream(search_base: impl Into<String>) -> Self {
        Self { search_base: search_base.into().trim_end_matches('/').to_string() }
    }

    fn split_coordinate(id: &str) -> Option<(&str, &str)> {
        id.split_once(':')
    }
}

impl Default for MavenEcosystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ecosystem for MavenEcosystem {
    fn meta(&self) -> &RegistryMeta {
        &META
    }

    fn group_id(&self) -> &str {
        "central.maven.org"
    }

    fn upstream_base(&self) -> &str {
        &self.search_base
    }

    fn normalize(&self, id: &str) -> String {
        id.trim().to_ascii_lowercase()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        maven_cmp(a, b)
    }

    async fn load_corpus(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/solrsearch/select?q=*:*&rows={CORPUS_ROWS}&wt=json",
            self.search_base
        );
        let results = cache.fetch_json(&url, CORPUS_TTL).await?;
        Ok(response_docs(&results, &url)?
            .iter()
            .filter_map(|d| d.get("id").and_then(Value::as_str))
            .map(|id| self.normalize(id))
            .collect())
    }

    async fn search(
        &self,
        cache: &Arc<HttpCache>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/solrsearch/select?q={}&rows={}&wt=json",
            self.search_base,
            urlencode(term),
            limit.clamp(1, MAX_GAV_ROWS)
        );
        let results = cache.fetch_json(&url, SEARCH_TTL).await?;
        Ok(response_docs(&results, &url)?
            .iter()
            .filter_map(|d| d.get("id").and_then(Value::as_str))
            .map(|id| self.normalize(id))
            .collect())
    }

    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError> {
        let (group, artifact) = Self::split_coordinate(id).ok_or_else(|| FetchError::NotFound {
            url: format!("{}:{id}", self.search_base),
        })?;
        let url = format!(
            "{}/solrsearch/select?q=g:{}+AND+a:{}&core=gav&rows={MAX_GAV_ROWS}&wt=json",
            self.search_base,
            urlencode(group),
            urlencode(artifact)
        );
        let results = cache.fetch_json(&url, PACKAGE_TTL).await?;
        let docs = response_docs(&results, &url)?;
        if docs.is_empty() {
            return Err(FetchError::NotFound { url });
        }

        let mut versions: Vec<VersionModel> = Vec::new();
        for doc in docs {
            let Some(version) = doc.get("v").and_then(Value::as_str) else { continue };
            let released_at = doc
                .get("timestamp")
                .and_then(Value::as_i64)
                .and_then(|millis| DateTime::<Utc>::from_timestamp_millis(millis));
            let mut attributes = Map::new();
            if let Some(packaging) = doc.get("p").and_then(Value::as_str) {
                attributes.insert("packaging".into(), json!(packaging));
            }
            versions.push(VersionModel { version: version.to_string(), released_at, attributes });
        }

        // newest timestamp is the upstream's latest pointer
        let default_version = versions
            .iter()
            .max_by(|a, b| match (a.released_at, b.released_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => maven_cmp(&a.version, &b.version),
            })
            .map(|v| v.version.clone());

        let mut attributes = Map::new();
        attributes.insert("groupid".into(), json!(group));
        attributes.insert("artifactid".into(), json!(artifact));

        Ok(PackageModel {
            name: id.to_string(),
            normalized: self.normalize(id),
            default_version,
            versions,
            attributes,
        })
    }
}

fn response_docs<'a>(results: &'a Value, url: &str) -> Result<&'a Vec<Value>, FetchError> {
    results
        .pointer("/response/docs")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed {
            url: url.to_string(),
            message: "missing 'response.docs' in search response".to_string(),
        })
}
