//! Group collection and singleton handlers.

use axum::response::Response;
use serde_json::Value;

use super::RequestContext;
use super::json_response;
use crate::facade;
use crate::state::AppState;

/// `GET /<groups>` — the group collection (a single group per facade).
pub async fn collection(state: &AppState, ctx: &RequestContext) -> Response {
    let doc = facade::group_collection(state, &ctx.base);
    json_response(Value::Object(doc), &ctx, None)
}

/// `GET /<groups>/<id>` — the group document.
pub async fn singleton(state: &AppState, ctx: &RequestContext) -> Response {
    let doc = facade::group_document(state, &ctx.base);
    json_response(Value::Object(doc), &ctx, None)
}
