//! Facade router configuration.
//!
//! ## Router Structure
//!
//! ```text
//! /                      - registry document
//! /model                 - static model document
//! /capabilities          - static capabilities document
//! /export                - 302 to the document form
//! /health                - liveness and index readiness
//! /performance/stats     - cache/index/entity counters
//! /<groups>/**           - entity dispatch (groups, resources, versions)
//! ```
//!
//! Entity paths go through a fallback dispatcher because resource
//! identifiers may span multiple path segments. Two middleware layers run
//! in front of everything: the read-only method policy (anything but GET
//! and OPTIONS is refused uniformly) and the optional bearer-key guard.

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;

use prism_core::ApiError;
use prism_core::TraceContext;
use prism_rewrite::apply_cors;

use crate::auth;
use crate::handlers;
use crate::handlers::ops;
use crate::handlers::registry;
use crate::state::AppState;

/// Build the complete facade router.
pub fn build_router(state: &AppState) -> Router {
    let router = Router::new()
        .route("/", get(registry::root))
        .route("/model", get(registry::model))
        .route("/capabilities", get(registry::capabilities))
        .route("/export", get(registry::export))
        .route("/health", get(ops::health))
        .route("/performance/stats", get(ops::stats))
        .fallback(handlers::dispatch_entity)
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        .layer(middleware::from_fn(method_policy))
        .with_state(state.clone());

    mount_under_prefix(router, &state.config.api_path_prefix)
}

/// Nest the router under the configured path prefix, if any.
///
/// A fronting router strips the prefix before dispatch; when the facade is
/// exposed directly, it must accept the prefixed form itself.
pub(crate) fn mount_under_prefix(router: Router, prefix: &str) -> Router {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        router
    } else {
        Router::new().nest(&format!("/{trimmed}"), router)
    }
}

/// Read-only method policy.
///
/// Mutating verbs get a uniform 405 problem; OPTIONS preflights are
/// answered directly with the permissive CORS set.
pub(crate) async fn method_policy(request: Request, next: Next) -> Response {
    let method = request.method();
    if method == Method::GET {
        return next.run(request).await;
    }
    if method == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors(response.headers_mut());
        response
            .headers_mut()
            .insert("access-control-max-age", HeaderValue::from_static("86400"));
        return response;
    }

    let err = ApiError::MethodNotAllowed { method: method.to_string() };
    let trace = TraceContext::from_headers(request.headers());
    crate::handlers::problem_response(&err, request.uri().path(), &trace)
}
