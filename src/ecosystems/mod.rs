//! Per-ecosystem upstream dialects.
//!
//! The facade engine is dialect-agnostic; everything ecosystem-specific —
//! upstream endpoints, identifier normalization, version ordering, and the
//! projection of upstream payloads into registry attributes — lives behind
//! the [`Ecosystem`] trait. Projections copy an enumerated attribute set,
//! never the whole upstream payload.

pub mod maven;
pub mod mcp;
pub mod npm;
pub mod oci;
pub mod pypi;
pub mod versions;

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;

use prism_cache::FetchError;
use prism_cache::HttpCache;
use prism_core::RegistryMeta;

/// The ecosystems a facade can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcosystemKind {
    /// npm registry JSON.
    Npm,
    /// PyPI JSON + simple index.
    Pypi,
    /// Maven Central search + repository layout.
    Maven,
    /// OCI distribution (tags/manifests).
    Oci,
    /// MCP server listing.
    Mcp,
}

impl EcosystemKind {
    /// Short service name, used in env vars and cache directories.
    pub fn service_name(&self) -> &'static str {
        match self {
            EcosystemKind::Npm => "npm",
            EcosystemKind::Pypi => "pypi",
            EcosystemKind::Maven => "maven",
            EcosystemKind::Oci => "oci",
            EcosystemKind::Mcp => "mcp",
        }
    }

    /// Conventional listen port for this facade.
    pub fn default_port(&self) -> u16 {
        match self {
            EcosystemKind::Npm => 3000,
            EcosystemKind::Pypi => 3100,
            EcosystemKind::Maven => 3300,
            EcosystemKind::Oci => 3400,
            EcosystemKind::Mcp => 3600,
        }
    }

    /// Documented corpus-size estimate advertised on the group document.
    pub fn default_packages_estimate(&self) -> Option<u64> {
        match self {
            EcosystemKind::Npm => Some(2_000_000),
            _ => None,
        }
    }

    /// Construct the dialect implementation.
    pub fn build(&self) -> Arc<dyn Ecosystem> {
        match self {
            EcosystemKind::Npm => Arc::new(npm::NpmEcosystem::new()),
            EcosystemKind::Pypi => Arc::new(pypi::PypiEcosystem::new()),
            EcosystemKind::Maven => Arc::new(maven::MavenEcosystem::new()),
            EcosystemKind::Oci => Arc::new(oci::OciEcosystem::new()),
            EcosystemKind::Mcp => Arc::new(mcp::McpEcosystem::new()),
        }
    }
}

impl FromStr for EcosystemKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npm" => Ok(EcosystemKind::Npm),
            "pypi" => Ok(EcosystemKind::Pypi),
            "maven" => Ok(EcosystemKind::Maven),
            "oci" => Ok(EcosystemKind::Oci),
            "mcp" => Ok(EcosystemKind::Mcp),
            _ => Err(()),
        }
    }
}

/// One version of a package, in facade-neutral shape.
#[derive(Debug, Clone)]
pub struct VersionModel {
    /// Version identifier as the upstream spells it.
    pub version: String,
    /// Upstream release time, when the dialect exposes one.
    pub released_at: Option<DateTime<Utc>>,
    /// Enumerated version-payload attributes.
    pub attributes: Map<String, Value>,
}

/// A package, in facade-neutral shape.
#[derive(Debug, Clone)]
pub struct PackageModel {
    /// Display name (URL path segments keep this form).
    pub name: String,
    /// Normalized identifier (`<resource>id` carries this form).
    pub normalized: String,
    /// The upstream's latest/stable pointer.
    pub default_version: Option<String>,
    /// All known versions, unordered.
    pub versions: Vec<VersionModel>,
    /// Enumerated resource-level attributes.
    pub attributes: Map<String, Value>,
}

impl PackageModel {
    /// Versions in chronological order: release time when known, the
    /// dialect's version ordering as tiebreak and fallback.
    pub fn chronological_versions(&self, eco: &dyn Ecosystem) -> Vec<&VersionModel> {
        let mut ordered: Vec<&VersionModel> = self.versions.iter().collect();
        ordered.sort_by(|a, b| match (a.released_at, b.released_at) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| eco.compare_versions(&a.version, &b.version)),
            _ => eco.compare_versions(&a.version, &b.version),
        });
        ordered
    }

    /// `ancestor` of a version: its immediate chronological predecessor,
    /// or itself for the oldest version.
    pub fn ancestor_of(&self, eco: &dyn Ecosystem, version: &str) -> Option<String> {
        let ordered = self.chronological_versions(eco);
        let idx = ordered.iter().position(|v| v.version == version)?;
        let ancestor = if idx == 0 { &ordered[0] } else { &ordered[idx - 1] };
        Some(ancestor.version.clone())
    }
}

/// One upstream registry dialect.
#[async_trait]
pub trait Ecosystem: Send + Sync {
    /// The facade's group/resource vocabulary.
    fn meta(&self) -> &RegistryMeta;

    /// The single group this facade exposes (e.g. `npmjs.org`).
    fn group_id(&self) -> &str;

    /// Upstream origin, the string the URL rewriter strips from payloads.
    fn upstream_base(&self) -> &str;

    /// Deterministic identifier normalization.
    fn normalize(&self, id: &str) -> String;

    /// Dialect version ordering.
    fn compare_versions(&self, a: &str, b: &str) -> Ordering;

    /// Load the full corpus of known package names for the name index.
    ///
    /// Called from a background task at boot; serving degrades to
    /// [`Ecosystem::search`] until it completes.
    async fn load_corpus(&self, cache: &Arc<HttpCache>) -> Result<Vec<String>, FetchError>;

    /// Upstream search fallback used while the index is loading.
    async fn search(
        &self,
        cache: &Arc<HttpCache>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError>;

    /// Fetch and project one package.
    async fn fetch_package(
        &self,
        cache: &Arc<HttpCache>,
        id: &str,
    ) -> Result<PackageModel, FetchError>;
}

/// Copy an enumerated set of keys from an upstream object, if present.
pub(crate) fn project_fields(
    source: &Map<String, Value>,
    fields: &[&str],
) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = source.get(*field) {
            if !value.is_null() {
                out.insert((*field).to_string(), value.clone());
            }
        }
    }
    out
}

/// Read a string field that may be a plain string or an object with an
/// inner key (`author.name`, `repository.url`, `license.type`).
pub(crate) fn string_or_inner(value: Option<&Value>, inner: &str) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get(inner).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            EcosystemKind::Npm,
            EcosystemKind::Pypi,
            EcosystemKind::Maven,
            EcosystemKind::Oci,
            EcosystemKind::Mcp,
        ] {
            assert_eq!(kind.service_name().parse::<EcosystemKind>().unwrap(), kind);
        }
        assert!("cargo".parse::<EcosystemKind>().is_err());
    }

    #[test]
    fn default_ports_are_distinct() {
        let ports = [
            EcosystemKind::Npm.default_port(),
            EcosystemKind::Pypi.default_port(),
            EcosystemKind::Maven.default_port(),
            EcosystemKind::Oci.default_port(),
            EcosystemKind::Mcp.default_port(),
        ];
        let mut unique = ports.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ports.len());
    }

    #[test]
    fn project_fields_copies_only_present_keys() {
        let mut source = Map::new();
        source.insert("description".into(), Value::String("a server".into()));
        source.insert("license".into(), Value::Null);

        let projected = project_fields(&source, &["description", "license", "homepage"]);
        assert_eq!(projected.len(), 1);
        assert!(projected.contains_key("description"));
    }

    #[test]
    fn string_or_inner_reads_both_shapes() {
        let plain = Value::String("MIT".into());
        assert_eq!(string_or_inner(Some(&plain), "type"), Some("MIT".into()));

        let object: Value = serde_json::json!({"type": "Apache-2.0"});
        assert_eq!(string_or_inner(Some(&object), "type"), Some("Apache-2.0".into()));
        assert_eq!(string_or_inner(None, "type"), None);
    }
}
