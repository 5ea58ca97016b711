//! Name index and filter optimizer for the Prism bridge.
//!
//! # Architecture
//!
//! A facade serves `filter=` queries over corpora of millions of package
//! names with bounded work:
//!
//! 1. **Name index**: an immutable sorted snapshot, built asynchronously at
//!    boot and swapped in atomically. Until it is ready, facades fall back
//!    to their upstream's search endpoint.
//!
//! 2. **Filter grammar**: `&`-joined `field=value` / `field!=value`
//!    clauses over a closed taxonomy, with `*` wildcards compiled to
//!    anchored case-insensitive regexes.
//!
//! 3. **Two-step evaluation**: name clauses are answered from the index;
//!    remaining clauses trigger metadata fetches for at most
//!    [`prism_core::constants::MAX_METADATA_FETCHES`] candidates, in
//!    parallel, short-circuiting once a page's worth of survivors is known.
//!
//! 4. **Result cache**: a bounded, age-capped LRU of evaluated pages.

pub mod error;
pub mod filter;
pub mod result_cache;
pub mod snapshot;
pub mod two_step;

pub use error::FilterError;
pub use filter::Field;
pub use filter::FilterExpr;
pub use result_cache::FilterResultCache;
pub use result_cache::ResultKey;
pub use snapshot::NameIndex;
pub use snapshot::NameSnapshot;
pub use two_step::EvalOutcome;
pub use two_step::MetadataSource;
pub use two_step::PackageHit;
pub use two_step::evaluate;
pub use two_step::field_values;
