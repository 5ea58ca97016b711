//! Upstream fetch error taxonomy.
//!
//! Errors are cloneable so a single-flight leader's failure can be handed
//! to every coalesced waiter by value.

use snafu::Snafu;

/// Errors from fetching or computing an upstream value.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Upstream answered 404 for the resource.
    #[snafu(display("upstream returned 404 for {url}"))]
    NotFound {
        /// The upstream URL (or synthetic key) that was not found.
        url: String,
    },

    /// Network failure, 5xx, or other non-success status.
    #[snafu(display("upstream unavailable for {url}: {message}"))]
    Unavailable {
        /// The upstream URL that failed.
        url: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The hard per-call time cap was exceeded.
    #[snafu(display("upstream call to {url} timed out after {seconds}s"))]
    Timeout {
        /// The upstream URL that timed out.
        url: String,
        /// The cap that was exceeded, in seconds.
        seconds: u64,
    },

    /// Upstream body was not the JSON we expected.
    #[snafu(display("malformed upstream response from {url}: {message}"))]
    Malformed {
        /// The upstream URL with the bad body.
        url: String,
        /// Parse failure description.
        message: String,
    },

    /// Upstream answered 429.
    #[snafu(display("rate limited by upstream at {url}"))]
    RateLimited {
        /// The upstream URL that throttled us.
        url: String,
    },
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Unavailable { .. } | FetchError::Timeout { .. } | FetchError::RateLimited { .. }
        )
    }
}

/// Result alias for cache operations.
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = FetchError::NotFound { url: "https://registry.npmjs.org/ghost".into() };
        assert_eq!(err.to_string(), "upstream returned 404 for https://registry.npmjs.org/ghost");
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_display_and_retryability() {
        let err = FetchError::Timeout { url: "https://pypi.org/simple/".into(), seconds: 5 };
        assert_eq!(err.to_string(), "upstream call to https://pypi.org/simple/ timed out after 5s");
        assert!(err.is_retryable());
    }

    #[test]
    fn errors_clone_for_coalesced_waiters() {
        let err = FetchError::RateLimited { url: "u".into() };
        assert_eq!(err.clone(), err);
    }
}
