//! Resource listing, singleton, and meta handlers.

use axum::response::Response;
use serde_json::Value;
use tracing::instrument;

use super::RequestContext;
use super::json_response;
use super::problem_response;
use crate::facade;
use crate::state::AppState;

/// `GET /<groups>/<id>/<resources>` — paginated, filterable, sortable.
#[instrument(skip_all, fields(filter = ?ctx.flags.filter, sort = ?ctx.flags.sort))]
pub async fn list(state: &AppState, ctx: &RequestContext) -> Response {
    match facade::list_resources(state, &ctx.base, &ctx.flags).await {
        Ok(page) => json_response(Value::Object(page.entries), &ctx, page.link),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}

/// `GET .../<resource>` — the resource with its default-version view.
#[instrument(skip_all, fields(resource = %id))]
pub async fn single(state: &AppState, ctx: &RequestContext, id: &str) -> Response {
    match facade::get_resource(state, &ctx.base, id).await {
        Ok(doc) => json_response(Value::Object(doc), &ctx, None),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}

/// `GET .../<resource>/meta` — identity view only.
pub async fn meta(state: &AppState, ctx: &RequestContext, id: &str) -> Response {
    match facade::get_resource_meta(state, &ctx.base, id).await {
        Ok(doc) => json_response(Value::Object(doc), &ctx, None),
        Err(err) => problem_response(&err, &ctx.instance, &ctx.trace),
    }
}
