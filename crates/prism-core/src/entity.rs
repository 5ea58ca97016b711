//! Entity document builders.
//!
//! Every response body in the uniform registry shape is assembled here, so
//! the rules for which attributes appear on which view live in one place.
//! Builders take the bridge-visible base URL and honor the two identity
//! invariants: `xid` is registry-relative and never carries an origin, and
//! `self` is always `base + xid`.

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::constants::SPEC_VERSION;
use crate::meta::RegistryMeta;

/// Synthetic identity counters for one logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityStamp {
    /// Monotonically non-decreasing change counter.
    pub epoch: u64,
    /// First observation time.
    pub created_at: DateTime<Utc>,
    /// Last observed change time.
    pub modified_at: DateTime<Utc>,
}

impl EntityStamp {
    /// Seed a stamp at the given instant.
    pub fn seeded_at(now: DateTime<Utc>) -> Self {
        Self { epoch: 1, created_at: now, modified_at: now }
    }

    fn apply(&self, doc: &mut Map<String, Value>) {
        doc.insert("epoch".into(), json!(self.epoch));
        doc.insert("createdat".into(), json!(iso8601(self.created_at)));
        doc.insert("modifiedat".into(), json!(iso8601(self.modified_at)));
    }
}

/// Render a timestamp the way every attribute expects it: ISO-8601 UTC,
/// second precision, `Z` suffix.
pub fn iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Join a base URL and an xid into a `self` URL.
pub fn self_url(base: &str, xid: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), xid)
}

/// The registry root document.
pub fn registry_doc(
    meta: &RegistryMeta,
    base: &str,
    stamp: &EntityStamp,
    group_count: u64,
) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("specversion".into(), json!(SPEC_VERSION));
    doc.insert("registryid".into(), json!(meta.registry_id));
    doc.insert("xid".into(), json!("/"));
    doc.insert("self".into(), json!(self_url(base, "/")));
    stamp.apply(&mut doc);
    doc.insert("modelurl".into(), json!(self_url(base, "/model")));
    doc.insert("capabilitiesurl".into(), json!(self_url(base, "/capabilities")));
    doc.insert(
        format!("{}url", meta.group_plural),
        json!(self_url(base, &format!("/{}", meta.group_plural))),
    );
    doc.insert(format!("{}count", meta.group_plural), json!(group_count));
    doc
}

/// A group document.
pub fn group_doc(
    meta: &RegistryMeta,
    base: &str,
    group_id: &str,
    stamp: &EntityStamp,
    resource_count: u64,
) -> Map<String, Value> {
    let xid = meta.group_xid(group_id);
    let mut doc = Map::new();
    doc.insert(meta.group_id_attr(), json!(group_id));
    doc.insert("name".into(), json!(group_id));
    doc.insert("xid".into(), json!(xid));
    doc.insert("self".into(), json!(self_url(base, &xid)));
    stamp.apply(&mut doc);
    doc.insert(
        format!("{}url", meta.resource_plural),
        json!(self_url(base, &format!("{xid}/{}", meta.resource_plural))),
    );
    doc.insert(format!("{}count", meta.resource_plural), json!(resource_count));
    doc
}

/// A resource document with its default-version view merged in.
///
/// `attributes` is the ecosystem projection of the default version's
/// payload (explicitly enumerated fields, copied only if present).
#[allow(clippy::too_many_arguments)]
pub fn resource_doc(
    meta: &RegistryMeta,
    base: &str,
    group_id: &str,
    resource_id: &str,
    normalized_id: &str,
    stamp: &EntityStamp,
    default_version: Option<&str>,
    versions_count: u64,
    attributes: Map<String, Value>,
) -> Map<String, Value> {
    let xid = meta.resource_xid(group_id, resource_id);
    let mut doc = Map::new();
    doc.insert(meta.resource_id_attr(), json!(normalized_id));
    doc.insert("name".into(), json!(resource_id));
    doc.insert("xid".into(), json!(xid));
    doc.insert("self".into(), json!(self_url(base, &xid)));
    stamp.apply(&mut doc);
    if let Some(version_id) = default_version {
        doc.insert("versionid".into(), json!(version_id));
        doc.insert("isdefault".into(), json!(true));
    }
    for (key, value) in attributes {
        doc.entry(key).or_insert(value);
    }
    doc.insert("metaurl".into(), json!(self_url(base, &format!("{xid}/meta"))));
    doc.insert("versionsurl".into(), json!(self_url(base, &format!("{xid}/versions"))));
    doc.insert("versionscount".into(), json!(versions_count));
    doc
}

/// The resource `meta` view: identity and default-version pointer only.
#[allow(clippy::too_many_arguments)]
pub fn resource_meta_doc(
    meta: &RegistryMeta,
    base: &str,
    group_id: &str,
    resource_id: &str,
    normalized_id: &str,
    stamp: &EntityStamp,
    default_version: Option<&str>,
) -> Map<String, Value> {
    let resource_xid = meta.resource_xid(group_id, resource_id);
    let xid = format!("{resource_xid}/meta");
    let mut doc = Map::new();
    doc.insert(meta.resource_id_attr(), json!(normalized_id));
    doc.insert("xid".into(), json!(xid));
    doc.insert("self".into(), json!(self_url(base, &xid)));
    stamp.apply(&mut doc);
    doc.insert("readonly".into(), json!(true));
    if let Some(version_id) = default_version {
        doc.insert("defaultversionid".into(), json!(version_id));
        doc.insert(
            "defaultversionurl".into(),
            json!(self_url(base, &format!("{resource_xid}/versions/{version_id}"))),
        );
        doc.insert("defaultversionsticky".into(), json!(false));
    }
    doc
}

/// A full version document.
#[allow(clippy::too_many_arguments)]
pub fn version_doc(
    meta: &RegistryMeta,
    base: &str,
    group_id: &str,
    resource_id: &str,
    normalized_id: &str,
    version_id: &str,
    is_default: bool,
    ancestor: &str,
    stamp: &EntityStamp,
    attributes: Map<String, Value>,
) -> Map<String, Value> {
    let xid = meta.version_xid(group_id, resource_id, version_id);
    let mut doc = Map::new();
    doc.insert("versionid".into(), json!(version_id));
    doc.insert(meta.resource_id_attr(), json!(normalized_id));
    doc.insert("xid".into(), json!(xid));
    doc.insert("self".into(), json!(self_url(base, &xid)));
    stamp.apply(&mut doc);
    doc.insert("isdefault".into(), json!(is_default));
    doc.insert("ancestor".into(), json!(ancestor));
    for (key, value) in attributes {
        doc.entry(key).or_insert(value);
    }
    doc
}

/// The version `meta` view.
///
/// Contains exactly the identity keys: `xid`, `self`, `versionid`,
/// `<resource>id`, `epoch`, `createdat`, `modifiedat`, `isdefault`,
/// `ancestor`.
#[allow(clippy::too_many_arguments)]
pub fn version_meta_doc(
    meta: &RegistryMeta,
    base: &str,
    group_id: &str,
    resource_id: &str,
    normalized_id: &str,
    version_id: &str,
    is_default: bool,
    ancestor: &str,
    stamp: &EntityStamp,
) -> Map<String, Value> {
    let xid = format!("{}/meta", meta.version_xid(group_id, resource_id, version_id));
    let mut doc = Map::new();
    doc.insert("xid".into(), json!(xid));
    doc.insert("self".into(), json!(self_url(base, &xid)));
    doc.insert("versionid".into(), json!(version_id));
    doc.insert(meta.resource_id_attr(), json!(normalized_id));
    stamp.apply(&mut doc);
    doc.insert("isdefault".into(), json!(is_default));
    doc.insert("ancestor".into(), json!(ancestor));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NPM: RegistryMeta = RegistryMeta {
        registry_id: "npm-wrapper",
        group_plural: "noderegistries",
        group_singular: "noderegistry",
        resource_plural: "packages",
        resource_singular: "package",
    };

    fn stamp() -> EntityStamp {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        EntityStamp::seeded_at(at)
    }

    #[test]
    fn self_equals_base_plus_xid() {
        let doc = group_doc(&NPM, "https://bridge.example", "npmjs.org", &stamp(), 7);
        let xid = doc["xid"].as_str().unwrap();
        let self_ = doc["self"].as_str().unwrap();
        assert_eq!(self_, format!("https://bridge.example{xid}"));
    }

    #[test]
    fn trailing_slash_on_base_is_collapsed() {
        assert_eq!(
            self_url("https://bridge.example/", "/noderegistries"),
            "https://bridge.example/noderegistries"
        );
    }

    #[test]
    fn registry_doc_lists_group_collection() {
        let doc = registry_doc(&NPM, "http://b", &stamp(), 1);
        assert_eq!(doc["specversion"], json!(SPEC_VERSION));
        assert_eq!(doc["xid"], json!("/"));
        assert_eq!(doc["noderegistriesurl"], json!("http://b/noderegistries"));
        assert_eq!(doc["noderegistriescount"], json!(1));
        assert_eq!(doc["modelurl"], json!("http://b/model"));
    }

    #[test]
    fn resource_doc_carries_normalized_id_and_display_name() {
        let doc = resource_doc(
            &NPM,
            "http://b",
            "npmjs.org",
            "Express",
            "express",
            &stamp(),
            Some("4.18.2"),
            12,
            Map::new(),
        );
        assert_eq!(doc["packageid"], json!("express"));
        assert_eq!(doc["name"], json!("Express"));
        assert_eq!(doc["versionid"], json!("4.18.2"));
        assert_eq!(doc["isdefault"], json!(true));
        assert_eq!(doc["versionscount"], json!(12));
    }

    #[test]
    fn resource_without_versions_has_no_default_attribute() {
        let doc = resource_doc(
            &NPM, "http://b", "npmjs.org", "ghost", "ghost", &stamp(), None, 0, Map::new(),
        );
        assert!(!doc.contains_key("versionid"));
        assert!(!doc.contains_key("isdefault"));
        assert_eq!(doc["versionscount"], json!(0));
    }

    #[test]
    fn version_meta_doc_has_exactly_the_identity_keys() {
        let doc = version_meta_doc(
            &NPM, "http://b", "npmjs.org", "express", "express", "4.0.0", false, "3.21.2", &stamp(),
        );
        let mut keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "ancestor", "createdat", "epoch", "isdefault", "modifiedat", "packageid", "self",
                "versionid", "xid",
            ]
        );
    }

    #[test]
    fn timestamps_are_second_precision_utc() {
        let rendered = iso8601(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(rendered, "2024-03-01T12:00:00Z");
    }

    #[test]
    fn projection_attributes_never_shadow_identity() {
        let mut attrs = Map::new();
        attrs.insert("xid".into(), json!("bogus"));
        attrs.insert("description".into(), json!("web framework"));
        let doc = resource_doc(
            &NPM, "http://b", "npmjs.org", "express", "express", &stamp(), Some("4.0.0"), 1, attrs,
        );
        assert_eq!(doc["xid"], json!("/noderegistries/npmjs.org/packages/express"));
        assert_eq!(doc["description"], json!("web framework"));
    }
}
