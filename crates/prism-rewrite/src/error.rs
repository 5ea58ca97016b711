//! Rewriting errors.

use snafu::Snafu;

/// Errors from base-URL resolution.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum RewriteError {
    /// Neither forwarded headers nor `Host` identify the bridge origin.
    #[snafu(display("cannot derive bridge base URL: no Host or X-Forwarded-Host header"))]
    MissingHost,
}
