//! Trace context adoption and propagation.
//!
//! Inbound `X-Trace-Id` / `X-Correlation-Id` / `X-Request-Id` headers are
//! adopted verbatim; missing ones are minted. The same context flows to
//! upstream calls, every log line, and every problem body.

use http::HeaderMap;
use uuid::Uuid;

use crate::constants::CORRELATION_ID_HEADER;
use crate::constants::REQUEST_ID_HEADER;
use crate::constants::TRACE_ID_HEADER;

/// Identifiers tying a request to its logs and upstream calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// Distributed trace identifier.
    pub trace_id: String,
    /// Correlation identifier, stable across a client's related requests.
    pub correlation_id: String,
    /// Identifier of this single request.
    pub request_id: String,
}

impl TraceContext {
    /// Adopt identifiers from inbound headers, minting any that are absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            trace_id: header_or_mint(headers, TRACE_ID_HEADER),
            correlation_id: header_or_mint(headers, CORRELATION_ID_HEADER),
            request_id: header_or_mint(headers, REQUEST_ID_HEADER),
        }
    }

    /// Mint a fresh context (used outside any HTTP request, e.g. boot tasks).
    pub fn mint() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Header pairs to attach to an outbound upstream call.
    pub fn outbound_headers(&self) -> [(&'static str, &str); 3] {
        [
            (TRACE_ID_HEADER, self.trace_id.as_str()),
            (CORRELATION_ID_HEADER, self.correlation_id.as_str()),
            (REQUEST_ID_HEADER, self.request_id.as_str()),
        ]
    }
}

fn header_or_mint(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
