//! HTTP handlers.
//!
//! Fixed routes (root, model, capabilities, export, ops) are registered
//! directly; everything under the group collection goes through
//! [`dispatch_entity`], because resource identifiers may contain path
//! separators (`@scope/name`, `library/nginx`) that segment-matched routes
//! cannot express. Handlers stay thin: parse flags, resolve the base URL,
//! call the facade, render.

pub mod groups;
pub mod ops;
pub mod registry;
pub mod resources;
pub mod versions;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use tracing::debug;

use prism_core::ApiError;
use prism_core::ProblemDetails;
use prism_core::RequestFlags;
use prism_core::TraceContext;
use prism_core::constants::CONTENT_TYPE_XREGISTRY;
use prism_core::constants::CORRELATION_ID_HEADER;
use prism_core::constants::TRACE_ID_HEADER;
use prism_core::constants::XREGISTRY_VERSION_HEADER;
use prism_core::constants::SPEC_VERSION;
use prism_rewrite::apply_cors;
use prism_rewrite::resolve_base_url;

use crate::state::AppState;

/// Per-request context shared by every handler.
pub(crate) struct RequestContext {
    pub trace: TraceContext,
    pub flags: RequestFlags,
    pub base: String,
    pub instance: String,
    /// Upstream origin, substituted out of every echoed payload.
    pub upstream: String,
}

impl RequestContext {
    /// Parse flags and derive the bridge base URL, or render the problem.
    pub fn build(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Result<Self, Response> {
        let trace = TraceContext::from_headers(headers);
        let instance = uri.path().to_string();

        let flags = RequestFlags::from_query(uri.query().unwrap_or(""))
            .map_err(|e| problem_response(&e, &instance, &trace))?;

        let base = resolve_base_url(
            headers,
            &state.config.api_path_prefix,
            state.config.base_url.as_deref(),
        )
        .map_err(|e| {
            let err = ApiError::BadRequest { detail: e.to_string() };
            problem_response(&err, &instance, &trace)
        })?;

        Ok(Self {
            trace,
            flags,
            base,
            instance,
            upstream: state.ecosystem.upstream_base().to_string(),
        })
    }
}

/// Render a JSON document with the registry content type and headers.
///
/// Echoed upstream payload fields may still carry the upstream origin
/// (tarball URLs, repository links); those are substituted here, with
/// `xid` fields exempt.
pub(crate) fn json_response(mut doc: Value, ctx: &RequestContext, link: Option<String>) -> Response {
    prism_rewrite::rewrite_value(&mut doc, &ctx.upstream, &ctx.base);
    let mut response = (StatusCode::OK, axum::Json(doc)).into_response();
    decorate(response.headers_mut(), &ctx.trace);
    if let Some(link) = link {
        let link = prism_rewrite::rewrite_link_header(&link, &ctx.upstream, &ctx.base);
        if let Ok(value) = HeaderValue::from_str(&link) {
            response.headers_mut().insert(axum::http::header::LINK, value);
        }
    }
    response
}

/// Render an RFC 9457 problem.
pub(crate) fn problem_response(err: &ApiError, instance: &str, trace: &TraceContext) -> Response {
    debug!(error = %err, instance, "responding with problem");
    let problem = ProblemDetails::from_error(err, instance, trace);
    let mut response = (err.status(), axum::Json(problem.to_value())).into_response();
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/problem+json"),
    );
    apply_cors(headers);
    insert_trace(headers, trace);
    response
}

fn decorate(headers: &mut HeaderMap, trace: &TraceContext) {
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_XREGISTRY),
    );
    headers.insert(XREGISTRY_VERSION_HEADER, HeaderValue::from_static(SPEC_VERSION));
    apply_cors(headers);
    insert_trace(headers, trace);
}

fn insert_trace(headers: &mut HeaderMap, trace: &TraceContext) {
    if let Ok(value) = HeaderValue::from_str(&trace.trace_id) {
        headers.insert(TRACE_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&trace.correlation_id) {
        headers.insert(CORRELATION_ID_HEADER, value);
    }
}

/// Route a group-collection path.
///
/// Parsed from the end, because resource identifiers may span several
/// segments; `meta` and `versions` are reserved segments in the path
/// space.
pub async fn dispatch_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let ctx = match RequestContext::build(&state, &headers, &uri) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let segments: Vec<String> = uri
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(percent_decode_segment)
        .collect();

    let meta = state.ecosystem.meta();
    let not_found = |ctx: &RequestContext| {
        let err = ApiError::NotFound { subject: ctx.instance.clone() };
        problem_response(&err, &ctx.instance, &ctx.trace)
    };

    if segments.is_empty() || segments[0] != meta.group_plural {
        return not_found(&ctx);
    }

    match segments.len() {
        1 => groups::collection(&state, &ctx).await,
        _ if segments[1] != state.ecosystem.group_id() => not_found(&ctx),
        2 => groups::singleton(&state, &ctx).await,
        _ if segments[2] != meta.resource_plural => not_found(&ctx),
        _ => {
            let fut: std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send + '_>> =
                Box::pin(resources::list(&state, &ctx));
            fut.await
        }
    }
}

/// Interpretations are tried longest-suffix first; an interpretation with
/// an empty resource id falls through to the next (so a package literally
/// named `versions` still resolves).
async fn dispatch_resource_tail(state: &AppState, ctx: &RequestContext, tail: &[String]) -> Response {
    let join = |parts: &[String]| parts.join("/");
    let n = tail.len();

    if n >= 3 && tail[n - 1] == "meta" && tail[n - 3] == "versions" {
        let rid = join(&tail[..n - 3]);
        if !rid.is_empty() {
            return versions::version_meta(state, ctx, &rid, &tail[n - 2]).await;
        }
    }
    if n >= 2 && tail[n - 2] == "versions" {
        let rid = join(&tail[..n - 2]);
        if !rid.is_empty() {
            return versions::version(state, ctx, &rid, &tail[n - 1]).await;
        }
    }
    if tail[n - 1] == "versions" {
        let rid = join(&tail[..n - 1]);
        if !rid.is_empty() {
            return versions::collection(state, ctx, &rid).await;
        }
    }
    if tail[n - 1] == "meta" {
        let rid = join(&tail[..n - 1]);
        if !rid.is_empty() {
            return resources::meta(state, ctx, &rid).await;
        }
    }
    resources::single(state, ctx, &join(tail)).await
}

fn percent_decode_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
