//! Version collection, singleton, and meta handlers.

use axum::response::Response;
use serde_json::Value;
use tracing::instrument;

use super::RequestContext;
use super::json_response;
use super::problem_response;
use crate::facade;
use crate::state::AppState;

/// `GET .../<resource>/versions` — the sorted version map.
#[instrument(skip_all, fields(resource = %id))]
pub async fn collection(state: &AppState, ctx: &RequestContext, id: &str) -> Response {
    match facade::get_versions(state, &ctx.base, id).await {
        Ok(doc) => json_response(Value::Object(doc), &ctx, None),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}

/// `GET .../versions/<vid>` — one full version view.
#[instrument(skip_all, fields(resource = %id, version = %version_id))]
pub async fn version(state: &AppState, ctx: &RequestContext, id: &str, version_id: &str) -> Response {
    match facade::get_version(state, &ctx.base, id, version_id).await {
        Ok(doc) => json_response(Value::Object(doc), &ctx, None),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}

/// `GET .../versions/<vid>/meta` — version identity view.
pub async fn version_meta(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    version_id: &str,
) -> Response {
    match facade::get_version_meta(state, &ctx.base, id, version_id).await {
        Ok(doc) => json_response(Value::Object(doc), &ctx, None),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}
