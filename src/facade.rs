//! The facade engine.
//!
//! Dialect-agnostic resolution of registry paths: documents for the root,
//! group, resource, version and meta views, plus the paginated, filtered,
//! sorted resource listing. Handlers stay thin; everything testable
//! without HTTP lives here.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use prism_cache::FetchError;
use prism_core::ApiError;
use prism_core::RequestFlags;
use prism_core::constants::FILTER_QUERY_DEADLINE;
use prism_core::constants::MAX_METADATA_FETCHES;
use prism_core::constants::MAX_UPSTREAM_IN_FLIGHT;
use prism_core::constants::SPEC_VERSION;
use prism_core::entity;
use prism_index::FilterExpr;
use prism_index::MetadataSource;
use prism_index::NameSnapshot;
use prism_index::PackageHit;
use prism_index::ResultKey;
use prism_index::evaluate;

use crate::ecosystems::PackageModel;
use crate::pagination::Page;
use crate::pagination::next_link;
use crate::sorting::SortDirective;
use crate::state::AppState;

/// A rendered resource collection page.
#[derive(Debug)]
pub struct ResourcePage {
    /// `name -> entry` map, in page order.
    pub entries: Map<String, Value>,
    /// `Link` header value for the next page, when one is due.
    pub link: Option<String>,
}

/// Map upstream fetch failures onto the client-facing taxonomy.
pub fn fetch_error(err: FetchError) -> ApiError {
    match err {
        FetchError::NotFound { url } => ApiError::NotFound { subject: url },
        FetchError::Timeout { seconds, .. } => ApiError::UpstreamTimeout { seconds },
        FetchError::RateLimited { url } => ApiError::UpstreamUnavailable {
            detail: format!("rate limited by upstream at {url}"),
        },
        FetchError::Unavailable { message, .. } | FetchError::Malformed { message, .. } => {
            ApiError::UpstreamUnavailable { detail: message }
        }
    }
}

// ============================================================================
// Static documents
// ============================================================================

/// The registry root document, honoring `inline`.
pub fn registry_document(state: &AppState, base: &str, flags: &RequestFlags) -> Map<String, Value> {
    let meta = state.ecosystem.meta();
    let stamp = state.entities.get("/");
    let mut doc = entity::registry_doc(meta, base, &stamp, 1);

    if flags.inlines(meta.group_plural) {
        doc.insert(meta.group_plural.to_string(), Value::Object(group_collection(state, base)));
    }
    if flags.inlines("model") {
        doc.insert("model".to_string(), model_document(state));
    }
    if flags.inlines("modelsource") {
        doc.insert("modelsource".to_string(), model_document(state));
    }
    if flags.inlines("capabilities") {
        doc.insert("capabilities".to_string(), capabilities_document());
    }
    doc
}

/// The static model document for this facade's vocabulary.
pub fn model_document(state: &AppState) -> Value {
    let meta = state.ecosystem.meta();
    json!({
        "groups": {
            meta.group_plural: {
                "plural": meta.group_plural,
                "singular": meta.group_singular,
                "resources": {
                    meta.resource_plural: {
                        "plural": meta.resource_plural,
                        "singular": meta.resource_singular,
                        "maxversions": 0,
                        "setversionid": false,
                        "setdefaultversionsticky": false,
                        "hasdocument": false,
                    }
                }
            }
        }
    })
}

/// The static capabilities document.
pub fn capabilities_document() -> Value {
    json!({
        "apis": ["/capabilities", "/export", "/model"],
        "flags": ["doc", "epoch", "filter", "inline", "limit", "offset", "schema", "sort"],
        "mutable": [],
        "pagination": true,
        "schemas": ["xRegistry-json/1.0-rc2"],
        "specversions": [SPEC_VERSION],
        "sticky": false,
    })
}

/// The group collection: this facade serves exactly one group.
pub fn group_collection(state: &AppState, base: &str) -> Map<String, Value> {
    let mut collection = Map::new();
    collection.insert(
        state.ecosystem.group_id().to_string(),
        Value::Object(group_document(state, base)),
    );
    collection
}

/// The group document.
pub fn group_document(state: &AppState, base: &str) -> Map<String, Value> {
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let stamp = state.entities.get(&meta.group_xid(group_id));
    entity::group_doc(meta, base, group_id, &stamp, resource_count(state))
}

/// Advertised resource count: the configured estimate when present (live
/// counting is impossible for multi-million-name corpora), otherwise the
/// index size once loaded.
fn resource_count(state: &AppState) -> u64 {
    state
        .config
        .packages_estimate
        .or_else(|| state.index.snapshot().map(|s| s.len() as u64))
        .unwrap_or(0)
}

/// The `/health` document.
pub fn health_document(state: &AppState) -> Value {
    json!({
        "status": "ok",
        "ecosystem": state.config.ecosystem.service_name(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "index_ready": state.index.is_ready(),
    })
}

/// The `/performance/stats` document.
pub fn stats_document(state: &AppState) -> Value {
    let index_names = state.index.snapshot().map(|s| s.len()).unwrap_or(0);
    json!({
        "cache": state.cache.stats(),
        "index": {
            "ready": state.index.is_ready(),
            "names": index_names,
        },
        "entities": state.entities.len(),
    })
}

// ============================================================================
// Resource listing
// ============================================================================

/// Metadata source backed by the dialect and the shared cache, so step-2
/// fetches coalesce with every other upstream call.
pub struct PackageMetadataSource {
    state: AppState,
}

impl PackageMetadataSource {
    /// Wrap the facade state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl MetadataSource for PackageMetadataSource {
    async fn metadata(&self, name: &str) -> Result<Arc<Value>, FetchError> {
        let model = self.state.ecosystem.fetch_package(&self.state.cache, name).await?;
        Ok(Arc::new(metadata_document(&model)))
    }
}

/// The flat metadata document step 2 filters and sorts against.
fn metadata_document(model: &PackageModel) -> Value {
    let mut doc = model.attributes.clone();
    doc.insert("name".to_string(), json!(model.name));
    if let Some(version) = &model.default_version {
        doc.insert("version".to_string(), json!(version));
    }
    doc.insert("versionscount".to_string(), json!(model.versions.len()));
    Value::Object(doc)
}

/// Resolve the paginated, optionally filtered and sorted resource listing.
pub async fn list_resources(
    state: &AppState,
    base: &str,
    flags: &RequestFlags,
) -> Result<ResourcePage, ApiError> {
    let page = Page::from_flags(flags)?;
    let sort = flags.sort.as_deref().map(SortDirective::parse).transpose()?;

    // sort applies to the whole candidate set, which only the index can
    // provide; wait for it, bounded by the query deadline
    let snapshot = if sort.is_some() {
        let ready = state.index.wait_ready(FILTER_QUERY_DEADLINE).await;
        Some(ready.ok_or(ApiError::UpstreamTimeout {
            seconds: FILTER_QUERY_DEADLINE.as_secs(),
        })?)
    } else {
        state.index.snapshot()
    };

    let filtered = flags.filter.is_some();
    let hits: Arc<Vec<PackageHit>> = match &flags.filter {
        Some(raw) => {
            let expr = FilterExpr::parse(raw)
                .map_err(|e| ApiError::BadRequest { detail: e.to_string() })?;
            let key = ResultKey {
                filter: expr.normalized(),
                limit: page.limit,
                offset: page.offset,
                sort: flags.sort.clone(),
            };
            match state.filter_cache.get(&key) {
                Some(cached) => cached,
                None => {
                    let computed =
                        filtered_page(state, snapshot.as_deref(), &expr, page, sort.as_ref())
                            .await?;
                    let computed = Arc::new(computed);
                    state.filter_cache.put(key, Arc::clone(&computed));
                    computed
                }
            }
        }
        None => Arc::new(unfiltered_page(state, snapshot.as_deref(), page, sort.as_ref()).await?),
    };

    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let mut entries = Map::new();
    for hit in hits.iter() {
        entries.insert(hit.name.clone(), Value::Object(resource_summary(state, base, hit)));
    }

    let collection_url = entity::self_url(
        base,
        &format!("/{}/{}/{}", meta.group_plural, group_id, meta.resource_plural),
    );
    let link = next_link(&collection_url, flags, page, entries.len(), filtered);

    Ok(ResourcePage { entries, link })
}

/// One page of a filtered listing, under the whole-query deadline.
async fn filtered_page(
    state: &AppState,
    snapshot: Option<&NameSnapshot>,
    expr: &FilterExpr,
    page: Page,
    sort: Option<&SortDirective>,
) -> Result<Vec<PackageHit>, ApiError> {
    let source = PackageMetadataSource::new(state.clone());
    let force_enrich = sort.map(SortDirective::needs_metadata).unwrap_or(false);

    let work: std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PackageHit>, ApiError>> + Send + '_>> =
        Box::pin(async {
            match snapshot {
                Some(snapshot) => {
                    let need = if sort.is_some() { usize::MAX } else { page.offset + page.limit };
                    Ok(evaluate(snapshot, expr, need, force_enrich, &source).await.hits)
                }
                None => {
                    // index still loading: translate the first name predicate
                    // into an upstream search and filter that page in memory
                    let Some(term) = expr.search_term().filter(|t| !t.is_empty()) else {
                        return Ok(Vec::new());
                    };
                    let names = state
                        .ecosystem
                        .search(&state.cache, term, page.offset + page.limit)
                        .await
                        .map_err(fetch_error)?;
                    let searched = NameSnapshot::from_names(names);
                    Ok(evaluate(&searched, expr, page.offset + page.limit, force_enrich, &source)
                        .await
                        .hits)
                }
            }
        });

    let mut hits: Vec<PackageHit> = tokio::time::timeout(FILTER_QUERY_DEADLINE, work)
        .await
        .map_err(|_| ApiError::UpstreamTimeout { seconds: FILTER_QUERY_DEADLINE.as_secs() })??;

    if let Some(sort) = sort {
        sort.apply(&mut hits);
    }
    Ok(hits.into_iter().skip(page.offset).take(page.limit).collect())
}

/// One page of the unfiltered listing: a deterministic slice of the index.
async fn unfiltered_page(
    state: &AppState,
    snapshot: Option<&NameSnapshot>,
    page: Page,
    sort: Option<&SortDirective>,
) -> Result<Vec<PackageHit>, ApiError> {
    // before the corpus lands there is nothing deterministic to slice
    let Some(snapshot) = snapshot else { return Ok(Vec::new()) };
    let names = snapshot.names();

    let plain = |name: &String| PackageHit { name: name.clone(), metadata: None };

    match sort {
        None => Ok(names.iter().skip(page.offset).take(page.limit).map(plain).collect()),
        Some(directive) if !directive.needs_metadata() => {
            if directive.descending {
                Ok(names.iter().rev().skip(page.offset).take(page.limit).map(plain).collect())
            } else {
                Ok(names.iter().skip(page.offset).take(page.limit).map(plain).collect())
            }
        }
        Some(directive) => {
            // metadata sort: enrich a bounded candidate window, then order
            let source = PackageMetadataSource::new(state.clone());
            let candidates = names.iter().take(MAX_METADATA_FETCHES);
            let mut stream = futures::stream::iter(candidates.map(|name| {
                let source = &source;
                let fut: std::pin::Pin<
                    Box<dyn std::future::Future<Output = (String, Result<Arc<Value>, FetchError>)> + Send + '_>,
                > = Box::pin(async move { (name.clone(), source.metadata(name).await) });
                fut
            }))
            .buffered(MAX_UPSTREAM_IN_FLIGHT);

            let mut hits = Vec::new();
            while let Some((name, fetched)) = stream.next().await {
                if let Ok(metadata) = fetched {
                    hits.push(PackageHit { name, metadata: Some(metadata) });
                }
            }
            directive.apply(&mut hits);
            Ok(hits.into_iter().skip(page.offset).take(page.limit).collect())
        }
    }
}

/// A listing entry: identity attributes, plus projected metadata when
/// step-2 enrichment ran for this query.
fn resource_summary(state: &AppState, base: &str, hit: &PackageHit) -> Map<String, Value> {
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let xid = meta.resource_xid(group_id, &hit.name);
    let stamp = state.entities.get(&xid);

    let mut doc = Map::new();
    doc.insert(meta.resource_id_attr(), json!(state.ecosystem.normalize(&hit.name)));
    doc.insert("name".to_string(), json!(hit.name));
    doc.insert("xid".to_string(), json!(xid));
    doc.insert("self".to_string(), json!(entity::self_url(base, &xid)));
    doc.insert("epoch".to_string(), json!(stamp.epoch));
    doc.insert("createdat".to_string(), json!(entity::iso8601(stamp.created_at)));
    doc.insert("modifiedat".to_string(), json!(entity::iso8601(stamp.modified_at)));

    if let Some(metadata) = &hit.metadata {
        if let Some(obj) = metadata.as_object() {
            for (key, value) in obj {
                match key.as_str() {
                    "name" => {}
                    "version" => {
                        doc.insert("versionid".to_string(), value.clone());
                    }
                    other => {
                        doc.entry(other.to_string()).or_insert_with(|| value.clone());
                    }
                }
            }
        }
    }

    doc.insert("metaurl".to_string(), json!(entity::self_url(base, &format!("{xid}/meta"))));
    doc.insert(
        "versionsurl".to_string(),
        json!(entity::self_url(base, &format!("{xid}/versions"))),
    );
    doc
}

// ============================================================================
// Single-resource views
// ============================================================================

async fn fetch_model(state: &AppState, id: &str) -> Result<PackageModel, ApiError> {
    state
        .ecosystem
        .fetch_package(&state.cache, id)
        .await
        .map_err(fetch_error)
}

/// Stable content hash for change detection on the entity store.
fn model_hash(model: &PackageModel) -> u64 {
    let mut hasher = DefaultHasher::new();
    model.default_version.hash(&mut hasher);
    for version in &model.versions {
        version.version.hash(&mut hasher);
    }
    hasher.finish()
}

/// The resource document: identity plus the default-version view.
pub async fn get_resource(
    state: &AppState,
    base: &str,
    id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let model = fetch_model(state, id).await?;
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let xid = meta.resource_xid(group_id, id);
    let stamp = state.entities.observe(&xid, model_hash(&model));

    let mut attributes = model.attributes.clone();
    if let Some(default_version) = &model.default_version {
        if let Some(version) = model.versions.iter().find(|v| &v.version == default_version) {
            for (key, value) in &version.attributes {
                attributes.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    Ok(entity::resource_doc(
        meta,
        base,
        group_id,
        id,
        &model.normalized,
        &stamp,
        model.default_version.as_deref(),
        model.versions.len() as u64,
        attributes,
    ))
}

/// The resource `meta` view.
pub async fn get_resource_meta(
    state: &AppState,
    base: &str,
    id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let model = fetch_model(state, id).await?;
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let xid = meta.resource_xid(group_id, id);
    let stamp = state.entities.observe(&xid, model_hash(&model));

    Ok(entity::resource_meta_doc(
        meta,
        base,
        group_id,
        id,
        &model.normalized,
        &stamp,
        model.default_version.as_deref(),
    ))
}

/// The sorted `versions` map. `versionscount` at the resource always
/// equals this map's size because both come from the same model.
pub async fn get_versions(
    state: &AppState,
    base: &str,
    id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let model = fetch_model(state, id).await?;
    let eco = state.ecosystem.as_ref();

    let mut ordered: Vec<&str> = model.versions.iter().map(|v| v.version.as_str()).collect();
    ordered.sort_by(|a, b| eco.compare_versions(a, b));

    let mut map = Map::new();
    for version in ordered {
        map.insert(
            version.to_string(),
            Value::Object(version_document(state, base, id, &model, version)?),
        );
    }
    Ok(map)
}

/// One full version view.
pub async fn get_version(
    state: &AppState,
    base: &str,
    id: &str,
    version_id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let model = fetch_model(state, id).await?;
    version_document(state, base, id, &model, version_id)
}

/// The version `meta` view.
pub async fn get_version_meta(
    state: &AppState,
    base: &str,
    id: &str,
    version_id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let model = fetch_model(state, id).await?;
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let (is_default, ancestor) = version_identity(state, &model, version_id)?;
    let xid = meta.version_xid(group_id, id, version_id);
    let stamp = state.entities.get(&xid);

    Ok(entity::version_meta_doc(
        meta,
        base,
        group_id,
        id,
        &model.normalized,
        version_id,
        is_default,
        &ancestor,
        &stamp,
    ))
}

fn version_document(
    state: &AppState,
    base: &str,
    id: &str,
    model: &PackageModel,
    version_id: &str,
) -> Result<Map<String, Value>, ApiError> {
    let meta = state.ecosystem.meta();
    let group_id = state.ecosystem.group_id();
    let (is_default, ancestor) = version_identity(state, model, version_id)?;
    let version = model
        .versions
        .iter()
        .find(|v| v.version == version_id)
        .expect("version_identity validated existence");
    let xid = meta.version_xid(group_id, id, version_id);
    let stamp = state.entities.get(&xid);

    Ok(entity::version_doc(
        meta,
        base,
        group_id,
        id,
        &model.normalized,
        version_id,
        is_default,
        &ancestor,
        &stamp,
        version.attributes.clone(),
    ))
}

/// Validate a version exists and derive its `(isdefault, ancestor)` pair.
fn version_identity(
    state: &AppState,
    model: &PackageModel,
    version_id: &str,
) -> Result<(bool, String), ApiError> {
    let eco = state.ecosystem.as_ref();
    let ancestor = model.ancestor_of(eco, version_id).ok_or_else(|| ApiError::NotFound {
        subject: format!("version {version_id} of {}", model.name),
    })?;
    let is_default = model.default_version.as_deref() == Some(version_id);
    Ok((is_default, ancestor))
}
