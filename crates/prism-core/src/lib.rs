//! Shared registry model for the Prism bridge.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! 1. **Entity documents**: builder helpers that produce the uniform
//!    registry shape (registry root, groups, resources, versions, meta
//!    views) as JSON maps, so attribute presence rules live in one place.
//!
//! 2. **Request plumbing**: typed request flags (`inline`, `filter`,
//!    `sort`, ...), trace context adoption/minting, and RFC 9457 problem
//!    bodies carrying trace identifiers.
//!
//! The bridge is read-only: every entity here is derived from upstream
//! data, never stored authoritatively.

pub mod constants;
pub mod entity;
pub mod error;
pub mod flags;
pub mod meta;
pub mod problem;
pub mod trace;

pub use constants::SPEC_VERSION;
pub use entity::EntityStamp;
pub use error::ApiError;
pub use flags::RequestFlags;
pub use meta::RegistryMeta;
pub use problem::ProblemDetails;
pub use trace::TraceContext;
