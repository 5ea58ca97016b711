//! Resource bounds and protocol constants.
//!
//! All limits are explicit and documented.

use std::time::Duration;

/// Registry spec version advertised by every facade.
pub const SPEC_VERSION: &str = "1.0-rc2";

/// Content-Type for every JSON response, schema-tagged.
pub const CONTENT_TYPE_XREGISTRY: &str =
    "application/json; schema=https://xregistry.io/schemas/xregistry-v1.0-rc2.json";

/// Response header carrying the spec version.
pub const XREGISTRY_VERSION_HEADER: &str = "xregistry-version";

/// Default page size for collection endpoints.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Maximum upstream metadata fetches a single filter query may trigger.
///
/// This is the hard fan-out cap of two-step filtering: step 2 enriches at
/// most this many candidates, so query cost stays bounded no matter how
/// broad the name predicate is.
pub const MAX_METADATA_FETCHES: usize = 100;

/// Maximum entries in the in-memory (L1) upstream response cache.
pub const MAX_CACHE_SIZE: usize = 1000;

/// Maximum entries in the filter-result cache.
pub const FILTER_CACHE_SIZE: usize = 2000;

/// Age cap for filter-result cache entries (10 minutes).
pub const MAX_FILTER_CACHE_AGE: Duration = Duration::from_secs(600);

/// Hard cap on a single upstream HTTP call (5 seconds).
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Whole-query deadline for a two-step filter evaluation (15 seconds).
pub const FILTER_QUERY_DEADLINE: Duration = Duration::from_secs(15);

/// Maximum concurrent in-flight upstream calls per facade.
///
/// Excess callers queue on the semaphore rather than erroring.
pub const MAX_UPSTREAM_IN_FLIGHT: usize = 16;

/// Freshness window for cached package metadata (5 minutes).
pub const PACKAGE_TTL: Duration = Duration::from_secs(300);

/// Freshness window for cached upstream search results (5 minutes).
pub const SEARCH_TTL: Duration = Duration::from_secs(300);

/// Freshness window for corpus listings used to build the name index (1 hour).
pub const CORPUS_TTL: Duration = Duration::from_secs(3600);

/// Trace/correlation headers adopted from inbound requests.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// See [`TRACE_ID_HEADER`].
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
/// See [`TRACE_ID_HEADER`].
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the bridge-visible base URL on proxied upstream calls.
pub const BASE_URL_HEADER: &str = "x-base-url";

// ============================================================================
// Compile-Time Constant Assertions
// ============================================================================

// Page and fan-out bounds must be positive
const _: () = assert!(DEFAULT_PAGE_LIMIT > 0);
const _: () = assert!(MAX_METADATA_FETCHES > 0);

// Cache bounds must be positive
const _: () = assert!(MAX_CACHE_SIZE > 0);
const _: () = assert!(FILTER_CACHE_SIZE > 0);

// The per-call timeout must fit inside the whole-query deadline
const _: () = assert!(UPSTREAM_TIMEOUT.as_secs() < FILTER_QUERY_DEADLINE.as_secs());

// At least one upstream call must be admitted
const _: () = assert!(MAX_UPSTREAM_IN_FLIGHT > 0);
