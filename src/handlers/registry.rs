//! Root, model, capabilities and export handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;

use prism_rewrite::apply_cors;

use super::RequestContext;
use super::json_response;
use crate::facade;
use crate::state::AppState;

/// `GET /` — the registry document.
pub async fn root(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let doc = facade::registry_document(&state, &ctx.base, &ctx.flags);
    json_response(Value::Object(doc), &ctx, None)
}

/// `GET /model` — the static model document.
pub async fn model(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    json_response(facade::model_document(&state), &ctx, None)
}

/// `GET /capabilities` — the static capabilities document.
pub async fn capabilities(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    json_response(facade::capabilities_document(), &ctx, None)
}

/// `GET /export` — 302 to the self-contained document form.
pub async fn export(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let target = format!("{}/?doc&inline=*,capabilities,modelsource", ctx.base);
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(&target) {
        response.headers_mut().insert(axum::http::header::LOCATION, value);
    }
    apply_cors(response.headers_mut());
    response
}
