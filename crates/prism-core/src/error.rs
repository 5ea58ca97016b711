//! Error taxonomy for the request path.
//!
//! Every failure a facade can surface maps onto one of these variants, and
//! each variant maps onto exactly one HTTP status. Problem bodies are
//! built from these in [`crate::problem`].

use http::StatusCode;
use snafu::Snafu;

/// Errors surfaced to clients as RFC 9457 problems.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    /// Malformed client input (invalid limit, unparseable filter, unknown flag).
    #[snafu(display("bad request: {detail}"))]
    BadRequest {
        /// What was wrong with the request.
        detail: String,
    },

    /// Missing or invalid API key.
    #[snafu(display("unauthorized: {detail}"))]
    Unauthorized {
        /// Why authorization failed.
        detail: String,
    },

    /// Unknown registry, package, or version.
    #[snafu(display("not found: {subject}"))]
    NotFound {
        /// The path or identifier that did not resolve.
        subject: String,
    },

    /// Mutating verb on the read-only surface.
    #[snafu(display("method {method} not allowed: registry is read-only"))]
    MethodNotAllowed {
        /// The refused HTTP method.
        method: String,
    },

    /// Upstream registry unreachable or returned a server error.
    #[snafu(display("upstream unavailable: {detail}"))]
    UpstreamUnavailable {
        /// Human-readable description of the upstream failure.
        detail: String,
    },

    /// Upstream call exceeded its hard time cap.
    #[snafu(display("upstream timed out after {seconds}s"))]
    UpstreamTimeout {
        /// The cap that was exceeded, in seconds.
        seconds: u64,
    },

    /// Unexpected internal failure.
    #[snafu(display("internal error: {detail}"))]
    Internal {
        /// Human-readable description.
        detail: String,
    },
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The problem `title` for this error.
    pub fn title(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "Bad Request",
            ApiError::Unauthorized { .. } => "Unauthorized",
            ApiError::NotFound { .. } => "Not Found",
            ApiError::MethodNotAllowed { .. } => "Method Not Allowed",
            ApiError::UpstreamUnavailable { .. } => "Upstream Unavailable",
            ApiError::UpstreamTimeout { .. } => "Upstream Timeout",
            ApiError::Internal { .. } => "Internal Server Error",
        }
    }
}
