//! Two-step filter evaluation.
//!
//! Step 1 answers every `name` clause from the in-memory snapshot,
//! producing an ordered candidate list: prefix matches of the primary
//! clause first, then remaining matches alphabetically. Step 2 fetches
//! metadata for surviving candidates, at most [`MAX_METADATA_FETCHES`] of
//! them, evaluating remaining clauses as results arrive and cancelling
//! outstanding fetches once enough survivors are known. A candidate whose
//! fetch fails is dropped; the query still succeeds with the rest.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use prism_core::constants::MAX_METADATA_FETCHES;
use prism_core::constants::MAX_UPSTREAM_IN_FLIGHT;

use prism_cache::FetchError;

use crate::filter::Clause;
use crate::filter::Field;
use crate::filter::FilterExpr;
use crate::snapshot::NameSnapshot;

/// Supplies package metadata for step 2.
///
/// Implemented by each facade over its upstream dialect and the shared
/// cache, so enrichment fetches are coalesced and bounded like any other
/// upstream call.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch metadata for one package name.
    async fn metadata(&self, name: &str) -> Result<Arc<Value>, FetchError>;
}

/// One filter survivor.
#[derive(Debug, Clone)]
pub struct PackageHit {
    /// Normalized package name.
    pub name: String,
    /// Metadata, present when step 2 enrichment ran for this query.
    pub metadata: Option<Arc<Value>>,
}

/// Evaluation result.
#[derive(Debug)]
pub struct EvalOutcome {
    /// Survivors in deterministic candidate order.
    pub hits: Vec<PackageHit>,
    /// Whether the candidate list was cut off at the fan-out cap, so more
    /// matches may exist beyond what step 2 examined.
    pub truncated: bool,
}

/// Evaluate `expr` against the snapshot, returning up to `need` survivors.
///
/// `force_enrich` makes step 2 run even without metadata clauses (used when
/// the caller must sort or render by a metadata field). Pass
/// `usize::MAX` as `need` to collect every survivor step 2 may examine.
pub async fn evaluate(
    snapshot: &NameSnapshot,
    expr: &FilterExpr,
    need: usize,
    force_enrich: bool,
    source: &dyn MetadataSource,
) -> EvalOutcome {
    let enrich = expr.needs_metadata() || force_enrich;

    // Step 1: cheap name predicates over the index.
    let candidate_cap = if enrich { MAX_METADATA_FETCHES } else { need };
    let (candidates, truncated) = step_one(snapshot, expr, candidate_cap);

    if !enrich {
        let hits = candidates
            .into_iter()
            .take(need)
            .map(|name| PackageHit { name, metadata: None })
            .collect();
        return EvalOutcome { hits, truncated };
    }

    // Step 2: bounded enrichment, in candidate order, short-circuiting.
    let metadata_clauses: Vec<&Clause> = expr.metadata_clauses().collect();
    let mut hits = Vec::new();

    let mut stream = futures::stream::iter(candidates.into_iter().map(|name| {
        let fut: std::pin::Pin<
            Box<dyn std::future::Future<Output = (String, Result<Arc<Value>, FetchError>)> + Send + '_>,
        > = Box::pin(async move {
            let fetched = source.metadata(&name).await;
            (name, fetched)
        });
        fut
    }))
    .buffered(MAX_UPSTREAM_IN_FLIGHT);

    while let Some((name, fetched)) = stream.next().await {
        match fetched {
            Ok(metadata) => {
                if metadata_clauses.iter().all(|c| clause_matches_metadata(c, &metadata)) {
                    hits.push(PackageHit { name, metadata: Some(metadata) });
                    if hits.len() >= need {
                        // dropping the stream cancels outstanding fetches
                        break;
                    }
                }
            }
            Err(e) => {
                debug!(name = %name, error = %e, "dropping candidate after metadata fetch failure");
            }
        }
    }

    EvalOutcome { hits, truncated }
}

/// Ordered candidate generation from name clauses.
///
/// Returns at most `cap` names and whether the cap cut the list short.
fn step_one(snapshot: &NameSnapshot, expr: &FilterExpr, cap: usize) -> (Vec<String>, bool) {
    let prefix = expr.primary_prefix();
    let mut out: Vec<String> = Vec::new();

    if !prefix.is_empty() {
        for name in snapshot.prefix_matches(prefix) {
            if expr.name_matches(name) {
                if out.len() >= cap {
                    return (out, true);
                }
                out.push(name.clone());
            }
        }
    }

    for name in snapshot.names() {
        if !prefix.is_empty() && name.starts_with(prefix) {
            continue; // already considered in the prefix pass
        }
        if expr.name_matches(name) {
            if out.len() >= cap {
                return (out, true);
            }
            out.push(name.clone());
        }
    }

    (out, false)
}

/// Evaluate one metadata clause against a package's metadata document.
fn clause_matches_metadata(clause: &Clause, metadata: &Value) -> bool {
    let values = field_values(clause.field, metadata);
    clause.matches_values(values.iter().map(String::as_str))
}

/// Extract the comparable strings for a field from a metadata document.
///
/// Shapes vary across ecosystems: `author` may be a string or an object
/// with a `name`, `repository` a string or an object with a `url`,
/// `keywords` an array. Only enumerated shapes are read. Also used by the
/// facade's sorter so filter and sort agree on field semantics.
pub fn field_values(field: Field, metadata: &Value) -> Vec<String> {
    let key = field.as_str();
    match metadata.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(obj)) => {
            let inner = match field {
                Field::Author => obj.get("name"),
                Field::Repository | Field::Homepage => obj.get("url"),
                _ => None,
            };
            inner
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}
