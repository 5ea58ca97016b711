//! Permissive CORS headers.
//!
//! The bridge is a public read-only API; every response carries the same
//! permissive header set, and preflights are answered without auth.

use http::HeaderMap;
use http::HeaderValue;

/// Allowed request headers, including the tracing family.
pub const ALLOW_HEADERS: &str =
    "Content-Type, Authorization, X-Base-Url, X-Correlation-Id, X-Trace-Id, X-Request-Id";

/// Headers exposed to browser clients.
pub const EXPOSE_HEADERS: &str = "Link, ETag, Location, xRegistry-Version";

/// Methods advertised on preflight. The surface only ever serves GET;
/// mutating verbs are advertised so their 405 problem bodies are readable
/// cross-origin.
pub const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Insert the permissive CORS header set.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
    headers.insert("access-control-allow-headers", HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert("access-control-expose-headers", HeaderValue::from_static(EXPOSE_HEADERS));
}
