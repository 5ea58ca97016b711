//! MCP registry dialect.
//!
//! Speaks the MCP community registry listing (`/v0/servers`). The listing
//! is small enough to cache whole; individual server lookups filter it in
//! memory, so one upstream call serves the corpus, search, and fetches.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use prism_cache::FetchError;
use prism_cache::HttpCache;
use prism_core::RegistryMeta;
use prism_core::constants::PACKAGE_TTL;

use super::Ecosystem;
use super::PackageModel;
use super::VersionModel;
use super::project_fields;
use super::versions::numeric_lexical_cmp;

const META: RegistryMeta = RegistryMeta {
    registry_id: "mcp-wrapper",
    group_plural: "mcpproviders",
    group_singular: "mcpprovider",
    resource_plural: "servers",
    resource_singular: "server",
};

/// Servers requested per listing page.
const LISTING_PAGE: usize = 5000;

/// Attributes copied from a server entry.
const SERVER_FIELDS: &[&str] = &["description", "repository", "homepage"];

/// The MCP registry dialect.
pub struct McpEcosystem {
    upstream: String,
}

impl McpEcosystem {
    /// Dialect against the community registry.
    pub fn new() -> Self {
        Self::with_upstream("https://registry.modelcontextprotocol.io")
    }

    /// Dialect against an explicit endpoint (tests, private registries).
    pub fn with_upstream(upstream: impl Into<String>) -> Self {
        Self { upstream: upstream.into().trim_end_matches('/').to_string() }
    }

    async fn listing(&self, cache: &Arc<HttpCache>) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/v0/servers?limit={LISTING_PAGE}", self.upstream);
        let listing = cache.fetch_json(&url, PACKAGE_TTL).await?;
        listing
            .get("servers")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| FetchError::Malformed {
                url,
                message: "missing 'servers' array in listing".to_string(),
            })
    }
}

impl Default for McpEcosystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ecosystem for McpEcosystem {
    fn meta(&self) -> &RegistryMeta {
        &META
    }

    fn group_id(&self) -> &str {
        "modelcontextprotocol.io"
    }

    fn upstream_base(&self) -> &str {
        &self.upstream
    }

    fn normalize(&self, id: &str) -> String {
        id.trim().to_ascii_lowercase()
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        numeric_lexical_cmp(a, b)
    }

    async fn load_corpus(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError> {
        Ok(self
            .listing(cache)
            .await?
            .iter()
            .filter_map(|s| s.get("name").and_then(Value::as_str))
            .map(|name| self.normalize(name))
            .collect())
    }

    async fn search(
        &self,
        cache: &Arc<HttpCache>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        let needle = self.normalize(term);
        let names = self.load_corpus(cache).await?;
        Ok(names.into_iter().filter(|n| n.contains(&needle)).take(limit).collect())
    }

    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError> {
        let normalized = self.normalize(id);
        let servers = self.listing(cache).await?;
        let server = servers
            .iter()
            .find(|s| {
                s.get("name")
                    .and_then(Value::as_str)
                    .map(|n| self.normalize(n) == normalized)
                    .unwrap_or(false)
            })
            .ok_or_else(|| FetchError::NotFound {
                url: format!("{}/v0/servers/{normalized}", self.upstream),
            })?;

        let name = server.get("name").and_then(Value::as_str).unwrap_or(id).to_string();
        let version = server
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("0.0.0")
            .to_string();

        let mut attributes = server
            .as_object()
            .map(|obj| project_fields(obj, SERVER_FIELDS))
            .unwrap_or_default();
        if let Some(repo) = server.get("repository").and_then(|r| r.get("url")).and_then(Value::as_str) {
            attributes.insert("repository".into(), json!(repo));
        }

        Ok(PackageModel {
            normalized,
            name,
            default_version: Some(version.clone()),
            versions: vec![VersionModel {
                version,
                released_at: None,
                attributes: Map::new(),
            }],
            attributes,
        })
    }
}
