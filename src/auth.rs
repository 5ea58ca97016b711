//! Optional Bearer-key guard.
//!
//! When `XREGISTRY_<SVC>_API_KEY` is set, every request must carry
//! `Authorization: Bearer <key>`, with two exemptions: CORS preflights,
//! and `/model` from loopback so local sidecars can introspect the schema.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::Method;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use prism_core::ApiError;
use prism_core::TraceContext;

use crate::handlers::problem_response;
use crate::state::AppState;

/// Middleware enforcing the configured API key, when present.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.clone() else {
        return next.run(request).await;
    };

    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    if request.uri().path() == "/model" && is_loopback(&request) {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected.as_str()) {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "rejecting request without valid bearer key");
    let err = ApiError::Unauthorized {
        detail: "missing or invalid bearer token".to_string(),
    };
    let trace = TraceContext::from_headers(request.headers());
    problem_response(&err, request.uri().path(), &trace)
}

fn is_loopback(request: &Request) -> bool {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().is_loopback())
        .unwrap_or(false)
}
