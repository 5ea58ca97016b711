//! URL rewriting for the Prism bridge.
//!
//! Payloads echoed from upstream registries embed upstream origins in
//! `self`, tarball, and navigation URLs. Clients must only ever see the
//! bridge's origin, so response bodies and `Link` headers pass through the
//! rewriter before leaving the process. Two rules are load-bearing:
//!
//! - `xid` is the canonical identifier and is **never** rewritten, even
//!   when its value happens to look like an upstream URL.
//! - Rewriting is idempotent: applying it to an already-rewritten body is
//!   a no-op.

pub mod base;
pub mod cors;
pub mod error;
pub mod json;
pub mod link;

pub use base::resolve_base_url;
pub use cors::apply_cors;
pub use error::RewriteError;
pub use json::rewrite_body;
pub use json::rewrite_value;
pub use link::rewrite_link_header;
