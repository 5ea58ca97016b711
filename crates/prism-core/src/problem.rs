//! RFC 9457 problem bodies.
//!
//! Every non-2xx response carries one of these, including the trace and
//! correlation identifiers so a client-reported failure can be matched to
//! server logs.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::trace::TraceContext;

/// An RFC 9457 problem-details body with trace extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub problem_type: String,

    /// Short human-readable summary, fixed per problem type.
    pub title: String,

    /// HTTP status code.
    pub status: u16,

    /// Occurrence-specific explanation.
    pub detail: String,

    /// The URL of the request that produced the problem.
    pub instance: String,

    /// Distributed trace identifier, for matching server logs.
    #[serde(rename = "traceId")]
    pub trace_id: String,

    /// Correlation identifier from the originating request.
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

impl ProblemDetails {
    /// Build a problem body from an [`ApiError`].
    pub fn from_error(err: &ApiError, instance: &str, trace: &TraceContext) -> Self {
        Self {
            problem_type: format!(
                "https://prism-registry.dev/problems/{}",
                slug(err.title())
            ),
            title: err.title().to_string(),
            status: err.status().as_u16(),
            detail: err.to_string(),
            instance: instance.to_string(),
            trace_id: trace.trace_id.clone(),
            correlation_id: trace.correlation_id.clone(),
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn slug(title: &str) -> String {
    title.to_ascii_lowercase().replace(' ', "-")
}
