//! HTTP server assembly and lifecycle.

pub mod lifecycle;
pub mod router;

pub use lifecycle::serve;
pub use router::build_router;
