//! npm registry dialect.
//!
//! Speaks the npm registry JSON API: packuments at `/{name}`, search at
//! `/-/v1/search`, and the replicate `_all_docs` listing for corpus
//! construction. Scoped names keep their `@scope/` form in display and
//! URL-encode the separator on upstream calls.

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
use super::project_fields;
use super::string_or_inner;
use super::versions::numeric_lexical_cmp;

const META: RegistryMeta = RegistryMeta {
    registry_id: "npm-wrapper",
    group_plural: "noderegistries",
    group_singular: "noderegistry",
    resource_plural: "packages",
    resource_singular: "package",
};

/// Resource-level attributes copied from the packument / latest version.
const RESOURCE_FIELDS: &[&str] =
    &["description", "license", "homepage", "keywords", "version"];

/// Version-level attributes copied from each version payload.
const VERSION_FIELDS: &[&str] = &[
    "description",
    "license",
    "dist",
    "dependencies",
    "peerDependencies",
    "engines",
    "deprecated",
];

/// Rows fetched from `_all_docs` for the boot-time corpus.
const CORPUS_ROWS: usize = 50_000;

/// The npm registry JSON dialect.
pub struct NpmEcosystem {
    upstream: String,
    replicate: String,
}

impl NpmEcosystem {
    /// Dialect against the public registry endpoints.
    pub fn new() -> Self {
        Self::with_upstream("https://registry.npmjs.org", "https://replicate.npmjs.com")
    }

    /// Dialect against explicit endpoints (tests, mirrors).
    pub fn with_upstream(upstream: impl Into<String>, replicate: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into().trim_end_matches('/').to_string(),
            replicate: replicate.into().trim_end_matches('/').to_string(),
        }
    }

    fn packument_url(&self, name: &str) -> String {
        // scoped names URL-encode the slash: @scope%2Fname
        format!("{}/{}", self.upstream, name.replace('/', "%2F"))
    }
}

impl Default for NpmEcosystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ecosystem for NpmEcosystem {
    fn meta(&self) -> &RegistryMeta {
        &META
    }

    fn group_id(&self) -> &str {
        "npmjs.org"
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
        let url = format!("{}/_all_docs?limit={CORPUS_ROWS}", self.replicate);
        let listing = cache.fetch_json(&url, CORPUS_TTL).await?;
        let rows = listing
            .get("rows")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed {
                url: url.clone(),
                message: "missing 'rows' array in _all_docs response".to_string(),
            })?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .filter(|id| !id.starts_with('_'))
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
            "{}/-/v1/search?text={}&size={}",
            self.upstream,
            urlencode(term),
            limit.clamp(1, 250)
        );
        let results = cache.fetch_json(&url, SEARCH_TTL).await?;
        let objects = results
            .get("objects")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed {
                url: url.clone(),
                message: "missing 'objects' array in search response".to_string(),
            })?;
        Ok(objects
            .iter()
            .filter_map(|o| o.pointer("/package/name").and_then(Value::as_str))
            .map(|name| self.normalize(name))
            .collect())
    }

    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError> {
        let url = self.packument_url(id);
        let packument = cache.fetch_json(&url, PACKAGE_TTL).await?;

        let name = packument
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        let default_version = packument
            .pointer("/dist-tags/latest")
            .and_then(Value::as_str)
            .map(str::to_string);

        let times = packument.get("time").and_then(Value::as_object);
        let mut versions = Vec::new();
        if let Some(version_map) = packument.get("versions").and_then(Value::as_object) {
            for (version, payload) in version_map {
                let released_at = times
                    .and_then(|t| t.get(version))
                    .and_then(Value::as_str)
                    .and_then(parse_time);
                let attributes = payload
                    .as_object()
                    .map(|obj| {
                        let mut attrs = project_fields(obj, VERSION_FIELDS);
                        if let Some(license) = string_or_inner(obj.get("license"), "type") {
                            attrs.insert("license".into(), json!(license));
                        }
                        attrs
                    })
                    .unwrap_or_default();
                versions.push(VersionModel { version: version.clone(), released_at, attributes });
            }
        }

        // the resource view reflects the default (latest) version
        let mut attributes = Map::new();
        if let Some(root) = packument.as_object() {
            attributes = project_fields(root, &["description", "homepage", "keywords"]);
            if let Some(license) = string_or_inner(root.get("license"), "type") {
                attributes.insert("license".into(), json!(license));
            }
            if let Some(author) = string_or_inner(root.get("author"), "name") {
                attributes.insert("author".into(), json!(author));
            }
            if let Some(repository) = string_or_inner(root.get("repository"), "url") {
                attributes.insert("repository".into(), json!(repository));
            }
        }
        if let (Some(latest), None) = (&default_version, attributes.get("description")) {
            // packuments for some packages carry metadata only per version
            if let Some(latest_payload) =
                packument.pointer(&format!("/versions/{latest}")).and_then(Value::as_object)
            {
                for (key, value) in project_fields(latest_payload, RESOURCE_FIELDS) {
                    attributes.entry(key).or_insert(value);
                }
            }
        }

        Ok(PackageModel {
            normalized: self.normalize(&name),
            name,
            default_version,
            versions,
            attributes,
        })
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

pub(crate) fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_names_encode_the_separator() {
        let eco = NpmEcosystem::new();
        assert_eq!(
            eco.packument_url("@types/node"),
            "https://registry.npmjs.org/@types%2Fnode"
        );
        assert_eq!(eco.packument_url("express"), "https://registry.npmjs.org/express");
    }

    #[test]
    fn normalization_lowercases_and_keeps_scope() {
        let eco = NpmEcosystem::new();
        assert_eq!(eco.normalize("Express"), "express");
        assert_eq!(eco.normalize("@Types/Node"), "@types/node");
    }

    #[test]
    fn search_terms_are_percent_encoded() {
        assert_eq!(urlencode("left pad"), "left%20pad");
        assert_eq!(urlencode("c++"), "c%2B%2B");
        assert_eq!(urlencode("safe-name_1.0~x"), "safe-name_1.0~x");
    }

    #[test]
    fn version_ordering_is_numeric_aware() {
        let eco = NpmEcosystem::new();
        assert_eq!(eco.compare_versions("4.9.0", "4.10.0"), Ordering::Less);
    }
}
