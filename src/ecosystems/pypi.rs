//! PyPI dialect.
//!
//! Speaks the PyPI JSON API (`/pypi/{name}/json`) and the JSON form of the
//! simple index (`/simple/`, PEP 691) for corpus construction. Identifier
//! normalization follows PEP 503; version ordering follows PEP 440.

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

use super::Ecosystem;
use super::PackageModel;
use super::VersionModel;
use super::versions::numeric_lexical_cmp;
use super::versions::pep440_cmp;

const META: RegistryMeta = RegistryMeta {
    registry_id: "pypi-wrapper",
    group_plural: "pythonregistries",
    group_singular: "pythonregistry",
    resource_plural: "packages",
    resource_singular: "package",
};

/// The PyPI dialect.
pub struct PypiEcosystem {
    upstream: String,
}

impl PypiEcosystem {
    /// Dialect against pypi.org.
    pub fn new() -> Self {
        Self::with_upstream("https://pypi.org")
    }

    /// Dialect against an explicit endpoint (tests, mirrors).
    pub fn with_upstream(upstream: impl Into<String>) -> Self {
        Self { upstream: upstream.into().trim_end_matches('/').to_string() }
    }

    async fn simple_index(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError> {
        // PEP 691: the simple index has a JSON rendering at the same path
        let url = format!("{}/simple/?format=application/vnd.pypi.simple.v1+json", self.upstream);
        let index = cache.fetch_json(&url, CORPUS_TTL).await?;
        let projects = index
            .get("projects")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed {
                url: url.clone(),
                message: "missing 'projects' array in simple index".to_string(),
            })?;
        Ok(projects
            .iter()
            .filter_map(|p| p.get("name").and_then(Value::as_str))
            .map(|name| self.normalize(name))
            .collect())
    }
}

impl Default for PypiEcosystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ecosystem for PypiEcosystem {
    fn meta(&self) -> &RegistryMeta {
        &META
    }

    fn group_id(&self) -> &str {
        "pypi.org"
    }

    fn upstream_base(&self) -> &str {
        &self.upstream
    }

    /// PEP 503: lowercase, runs of `-`, `_`, `.` collapse to `-`.
    fn normalize(&self, id: &str) -> String {
        let mut out = String::with_capacity(id.len());
        let mut last_was_sep = false;
        for c in id.trim().chars() {
            if matches!(c, '-' | '_' | '.') {
                if !last_was_sep {
                    out.push('-');
                }
                last_was_sep = true;
            } else {
                out.push(c.to_ascii_lowercase());
                last_was_sep = false;
            }
        }
        out
    }

    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        pep440_cmp(a, b).unwrap_or_else(|| numeric_lexical_cmp(a, b))
    }

    async fn load_corpus(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError> {
        self.simple_index(cache).await
    }

    /// PyPI has no JSON search endpoint; the cached simple index doubles
    /// as the fallback, filtered by substring.
    async fn search(
        &self,
        cache: &Arc<HttpCache>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        let needle = self.normalize(term);
        let names = self.simple_index(cache).await?;
        Ok(names
            .into_iter()
            .filter(|name| name.contains(&needle))
            .take(limit)
            .collect())
    }

    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError> {
        let normalized = self.normalize(id);
        let url = format!("{}/pypi/{normalized}/json", self.upstream);
        let document = cache.fetch_json(&url, PACKAGE_TTL).await?;

        let info = document.get("info").and_then(Value::as_object);
        let name = info
            .and_then(|i| i.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        let default_version = info
            .and_then(|i| i.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut versions = Vec::new();
        if let Some(releases) = document.get("releases").and_then(Value::as_object) {
            for (version, files) in releases {
                let released_at = files
                    .as_array()
                    .and_then(|files| {
                        files
                            .iter()
                            .filter_map(|f| {
                                f.get("upload_time_iso_8601").and_then(Value::as_str).and_then(parse_time)
                            })
                            .min()
                    });
                let mut attributes = Map::new();
                if let Some(file_count) = files.as_array().map(Vec::len) {
                    attributes.insert("filecount".into(), json!(file_count));
                }
                versions.push(VersionModel { version: version.clone(), released_at, attributes });
            }
        }

        let mut attributes = Map::new();
        if let Some(info) = info {
            if let Some(summary) = info.get("summary").and_then(Value::as_str) {
                attributes.insert("description".into(), json!(summary));
            }
            for (source, target) in
                [("license", "license"), ("home_page", "homepage"), ("author", "author")]
            {
                if let Some(value) = info.get(source).and_then(Value::as_str).filter(|v| !v.is_empty()) {
                    attributes.insert(target.into(), json!(value));
                }
            }
            if let Some(keywords) = info.get("keywords").and_then(Value::as_str).filter(|k| !k.is_empty()) {
                let list: Vec<&str> = keywords
                    .split([',', ' '])
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .collect();
                attributes.insert("keywords".into(), json!(list));
            }
            let project_urls = info.get("project_urls");
            if let Some(repository) = project_urls
                .and_then(|u| u.get("Source").or_else(|| u.get("Repository")))
                .and_then(Value::as_str)
            {
                attributes.insert("repository".into(), json!(repository));
            }
        }

        Ok(PackageModel { name, normalized, default_version, versions, attributes })
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}
