//! Upstream HTTP client and cache manager for the Prism bridge.
//!
//! # Architecture
//!
//! The cache has two tiers:
//!
//! 1. **L1 (memory)**: a size-bounded LRU over parsed JSON values. Expired
//!    entries are ignored and dropped on access.
//!
//! 2. **L2 (disk)**: one file per key (SHA-256 of the key), written
//!    atomically, carrying the TTL so freshness survives restart. Corrupt
//!    files are deleted and treated as misses.
//!
//! Concurrent misses on the same key coalesce into a single outbound call
//! (single-flight); every waiter receives the same result or error. A
//! failed attempt is never cached, so the next arrival starts fresh.
//! Outbound concurrency is bounded by a semaphore shared across all keys.

pub mod cache;
pub mod disk;
pub mod error;

pub use cache::CacheStats;
pub use cache::HttpCache;
pub use cache::HttpCacheConfig;
pub use disk::DiskCache;
pub use disk::DiskHit;
pub use error::FetchError;
pub use error::Result;
