//! Operational endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Uri;
use axum::response::Response;

use super::RequestContext;
use super::json_response;
use crate::facade;
use crate::state::AppState;

/// `GET /health`.
pub async fn health(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    json_response(facade::health_document(&state), &ctx, None)
}

/// `GET /performance/stats`.
pub async fn stats(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    json_response(facade::stats_document(&state), &ctx, None)
}
