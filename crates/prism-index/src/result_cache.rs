//! Bounded cache of filter results.
//!
//! Keyed by the normalized filter plus paging and sort parameters, so two
//! spellings of the same expression share an entry. Entries age out after
//! [`MAX_FILTER_CACHE_AGE`] even while the LRU still has room.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use lru::LruCache;

use prism_core::constants::FILTER_CACHE_SIZE;
use prism_core::constants::MAX_FILTER_CACHE_AGE;

use crate::two_step::PackageHit;

/// Cache key: normalized filter, page, and sort directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    /// Canonical filter expression ([`crate::FilterExpr::normalized`]).
    pub filter: String,
    /// Page size.
    pub limit: usize,
    /// Page offset.
    pub offset: usize,
    /// Sort directive, verbatim.
    pub sort: Option<String>,
}

struct CachedPage {
    at: Instant,
    hits: Arc<Vec<PackageHit>>,
}

/// LRU of evaluated filter pages.
pub struct FilterResultCache {
    entries: Mutex<LruCache<ResultKey, CachedPage>>,
    max_age: Duration,
}

impl FilterResultCache {
    /// Cache with the default capacity and age cap.
    pub fn new() -> Self {
        Self::with_limits(FILTER_CACHE_SIZE, MAX_FILTER_CACHE_AGE)
    }

    /// Cache with explicit bounds (tests).
    pub fn with_limits(capacity: usize, max_age: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_age,
        }
    }

    /// Look up a page, dropping it if it has aged out.
    pub fn get(&self, key: &ResultKey) -> Option<Arc<Vec<PackageHit>>> {
        let mut entries = self.entries.lock().expect("filter cache lock");
        match entries.get(key) {
            Some(page) if page.at.elapsed() <= self.max_age => Some(Arc::clone(&page.hits)),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a page.
    pub fn put(&self, key: ResultKey, hits: Arc<Vec<PackageHit>>) {
        let mut entries = self.entries.lock().expect("filter cache lock");
        entries.put(key, CachedPage { at: Instant::now(), hits });
    }
}

impl Default for FilterResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(filter: &str) -> ResultKey {
        ResultKey { filter: filter.into(), limit: 20, offset: 0, sort: None }
    }

    fn page(names: &[&str]) -> Arc<Vec<PackageHit>> {
        Arc::new(
            names
                .iter()
                .map(|n| PackageHit { name: n.to_string(), metadata: None })
                .collect(),
        )
    }

    #[test]
    fn stores_and_returns_pages() {
        let cache = FilterResultCache::new();
        cache.put(key("name=react*"), page(&["react", "react-dom"]));

        let got = cache.get(&key("name=react*")).unwrap();
        assert_eq!(got.len(), 2);
        assert!(cache.get(&key("name=vue*")).is_none());
    }

    #[test]
    fn distinct_pages_are_distinct_entries() {
        let cache = FilterResultCache::new();
        let mut second = key("name=react*");
        second.offset = 20;

        cache.put(key("name=react*"), page(&["react"]));
        cache.put(second.clone(), page(&["react-native"]));

        assert_eq!(cache.get(&key("name=react*")).unwrap()[0].name, "react");
        assert_eq!(cache.get(&second).unwrap()[0].name, "react-native");
    }

    #[test]
    fn entries_age_out() {
        let cache = FilterResultCache::with_limits(10, Duration::from_millis(0));
        cache.put(key("name=react*"), page(&["react"]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("name=react*")).is_none());
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = FilterResultCache::with_limits(2, Duration::from_secs(60));
        cache.put(key("a=1"), page(&["a"]));
        cache.put(key("b=1"), page(&["b"]));
        cache.put(key("c=1"), page(&["c"]));
        // the oldest entry was displaced
        assert!(cache.get(&key("a=1")).is_none());
        assert!(cache.get(&key("c=1")).is_some());
    }
}
