//! Tiered upstream cache with single-flight coalescing.
//!
//! Lookup order is L1 (in-process LRU of parsed bodies), then L2 (disk),
//! then one outbound call. Concurrent misses on the same key join a
//! single in-flight computation and all receive its result or error. The
//! in-flight future is held only weakly by the cache, so it is cancelled
//! exactly when the last waiter goes away.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::future::WeakShared;
use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::debug;
use tracing::warn;

use prism_core::TraceContext;
use prism_core::constants::MAX_CACHE_SIZE;
use prism_core::constants::MAX_UPSTREAM_IN_FLIGHT;
use prism_core::constants::UPSTREAM_TIMEOUT;

use crate::disk::DiskCache;
use crate::disk::DiskHit;
use crate::error::FetchError;
use crate::error::Result;

type FlightResult = Result<Arc<Value>>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;
type WeakFlight = WeakShared<BoxFuture<'static, FlightResult>>;

/// Cache construction parameters.
#[derive(Debug, Clone)]
pub struct HttpCacheConfig {
    /// Directory for the disk tier.
    pub cache_dir: PathBuf,
    /// L1 capacity in entries.
    pub max_entries: usize,
    /// Hard cap per upstream call.
    pub upstream_timeout: Duration,
    /// Concurrent outbound calls admitted; excess callers queue.
    pub max_in_flight: usize,
    /// User-Agent sent upstream.
    pub user_agent: String,
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            max_entries: MAX_CACHE_SIZE,
            upstream_timeout: UPSTREAM_TIMEOUT,
            max_in_flight: MAX_UPSTREAM_IN_FLIGHT,
            user_agent: concat!("prism/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Counters exposed at `/performance/stats`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// L1 hits.
    pub hits: u64,
    /// Lookups that had to go past L1.
    pub misses: u64,
    /// Current L1 entry count.
    pub size: u64,
    /// L1 entries displaced by capacity.
    pub evictions: u64,
    /// Misses satisfied from the disk tier.
    pub l2_hits: u64,
}

struct L1Entry {
    value: Arc<Value>,
    stored_at: Instant,
    ttl: Duration,
}

impl L1Entry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    l2_hits: AtomicU64,
}

/// The upstream HTTP client and its cache tiers.
pub struct HttpCache {
    client: reqwest::Client,
    disk: DiskCache,
    l1: Mutex<LruCache<String, L1Entry>>,
    flights: Mutex<HashMap<String, WeakFlight>>,
    semaphore: Arc<Semaphore>,
    upstream_timeout: Duration,
    counters: Counters,
}

impl HttpCache {
    /// Build the cache, creating the disk directory if needed.
    pub async fn new(config: HttpCacheConfig) -> std::io::Result<Arc<Self>> {
        let disk = DiskCache::open(&config.cache_dir).await?;
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).expect("capacity >= 1");
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        Ok(Arc::new(Self {
            client,
            disk,
            l1: Mutex::new(LruCache::new(capacity)),
            flights: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            upstream_timeout: config.upstream_timeout,
            counters: Counters::default(),
        }))
    }

    /// Fetch upstream JSON through the cache tiers.
    pub async fn fetch_json(self: &Arc<Self>, url: &str, ttl: Duration) -> FlightResult {
        self.fetch_json_traced(url, ttl, None).await
    }

    /// [`Self::fetch_json`] with trace identifiers propagated upstream.
    pub async fn fetch_json_traced(
        self: &Arc<Self>,
        url: &str,
        ttl: Duration,
        trace: Option<TraceContext>,
    ) -> FlightResult {
        let client = self.client.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let timeout = self.upstream_timeout;
        let url_owned = url.to_string();
        self.get_or_compute(url, ttl, move || {
            http_get_json(client, semaphore, url_owned, timeout, trace)
        })
        .await
    }

    /// Run `compute` at most once per key across concurrent callers,
    /// caching its result under `key` with the given TTL.
    pub async fn get_or_compute<F, Fut>(
        self: &Arc<Self>,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> FlightResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        if let Some(value) = self.l1_get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        self.join_flight(key, ttl, compute).await
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let size = self.l1.lock().expect("l1 lock").len() as u64;
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            size,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            l2_hits: self.counters.l2_hits.load(Ordering::Relaxed),
        }
    }

    fn l1_get(&self, key: &str) -> Option<Arc<Value>> {
        let mut l1 = self.l1.lock().expect("l1 lock");
        match l1.get(key) {
            Some(entry) if entry.is_fresh() => Some(Arc::clone(&entry.value)),
            Some(_) => {
                // expired: drop it so a fresh fetch replaces it
                l1.pop(key);
                None
            }
            None => None,
        }
    }

    fn l1_put(&self, key: &str, value: Arc<Value>, ttl: Duration) {
        let entry = L1Entry { value, stored_at: Instant::now(), ttl };
        let mut l1 = self.l1.lock().expect("l1 lock");
        if let Some((evicted_key, _)) = l1.push(key.to_string(), entry) {
            if evicted_key != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Join or start the single in-flight computation for `key`.
    ///
    /// The flights map holds only weak handles: when every waiter has
    /// dropped its clone, the underlying future is dropped too, which is
    /// the cancellation rule the coalescer must honor.
    fn join_flight<F, Fut>(self: &Arc<Self>, key: &str, ttl: Duration, compute: F) -> Flight
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let mut flights = self.flights.lock().expect("flights lock");

        if let Some(existing) = flights.get(key).and_then(WeakFlight::upgrade) {
            debug!(key, "joining in-flight upstream call");
            return existing;
        }

        let cache = Arc::clone(self);
        let key_owned = key.to_string();
        let flight: Flight = async move {
            let result = cache.run_flight(&key_owned, ttl, compute).await;
            cache.flights.lock().expect("flights lock").remove(&key_owned);
            result
        }
        .boxed()
        .shared();

        if let Some(weak) = flight.downgrade() {
            flights.insert(key.to_string(), weak);
        }
        flight
    }

    async fn run_flight<F, Fut>(self: &Arc<Self>, key: &str, ttl: Duration, compute: F) -> FlightResult
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<Value>> + Send,
    {
        // L2 before going upstream; an expired entry is remembered as a
        // stale stand-in for transient upstream failures
        let warm = match self.disk.read(key).await {
            DiskHit::Fresh(value) => {
                self.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
                self.l1_put(key, Arc::clone(&value), ttl);
                return Ok(value);
            }
            DiskHit::Warm(stale) => Some(stale),
            DiskHit::Miss => None,
        };

        match compute().await {
            Ok(body) => {
                if let Err(e) = self.disk.write(key, ttl.as_secs(), &body).await {
                    warn!(key, error = %e, "failed to persist cache entry");
                }
                let value = Arc::new(body);
                self.l1_put(key, Arc::clone(&value), ttl);
                Ok(value)
            }
            Err(e) => match warm {
                Some(stale) if e.is_retryable() => {
                    warn!(key, error = %e, "upstream failed transiently, serving stale cache entry");
                    Ok(stale)
                }
                _ => {
                    debug!(key, error = %e, "upstream computation failed");
                    Err(e)
                }
            },
        }
    }
}

/// One bounded outbound GET, mapped onto the fetch taxonomy.
async fn http_get_json(
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    url: String,
    timeout: Duration,
    trace: Option<TraceContext>,
) -> Result<Value> {
    let _permit = semaphore.acquire_owned().await.map_err(|_| FetchError::Unavailable {
        url: url.clone(),
        message: "upstream concurrency gate closed".to_string(),
    })?;

    let mut request = client.get(&url);
    if let Some(trace) = &trace {
        for (name, value) in trace.outbound_headers() {
            request = request.header(name, value);
        }
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout { url: url.clone(), seconds: timeout.as_secs() }
        } else {
            FetchError::Unavailable { url: url.clone(), message: e.to_string() }
        }
    })?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(FetchError::NotFound { url });
    }
    if status.as_u16() == 429 {
        return Err(FetchError::RateLimited { url });
    }
    if !status.is_success() {
        return Err(FetchError::Unavailable {
            url,
            message: format!("upstream status {status}"),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout { url: url.clone(), seconds: timeout.as_secs() }
        } else {
            FetchError::Unavailable { url: url.clone(), message: e.to_string() }
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed {
        url,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    async fn cache_in(dir: &std::path::Path) -> Arc<HttpCache> {
        HttpCache::new(HttpCacheConfig {
            cache_dir: dir.to_path_buf(),
            ..HttpCacheConfig::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn compute_runs_once_for_concurrent_callers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared-key", Duration::from_secs(60), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!({"value": 42}))
                    })
                    .await
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(*value, json!({"value": 42}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_reach_every_waiter_and_next_caller_retries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            cache.get_or_compute("key", Duration::from_secs(60), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Unavailable { url: "key".into(), message: "boom".into() })
            })
        };
        assert!(failing.await.is_err());

        // the failure is not cached; a later arrival starts a new attempt
        let calls2 = Arc::clone(&calls);
        let ok = cache
            .get_or_compute("key", Duration::from_secs(60), move || async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(json!("recovered"))
            })
            .await
            .unwrap();
        assert_eq!(*ok, json!("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_lookup_is_an_l1_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;

        for _ in 0..2 {
            cache
                .get_or_compute("key", Duration::from_secs(60), || async { Ok(json!(1)) })
                .await
                .unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn disk_tier_survives_l1_loss() {
        let dir = tempfile::tempdir().unwrap();

        let first = cache_in(dir.path()).await;
        first
            .get_or_compute("key", Duration::from_secs(300), || async { Ok(json!({"warm": true})) })
            .await
            .unwrap();

        // a fresh cache instance over the same directory finds the entry on disk
        let second = cache_in(dir.path()).await;
        let value = second
            .get_or_compute("key", Duration::from_secs(300), || async {
                panic!("disk hit must not recompute")
            })
            .await
            .unwrap();
        assert_eq!(*value, json!({"warm": true}));
        assert_eq!(second.stats().l2_hits, 1);
    }

    #[tokio::test]
    async fn expired_l1_entries_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            cache
                .get_or_compute("key", Duration::from_millis(10), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(1))
                })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1100)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_failure_serves_stale_disk_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path()).await;

        // seed a warm (already expired) disk entry
        cache
            .get_or_compute("key", Duration::from_millis(10), || async { Ok(json!("stale")) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let value = cache
            .get_or_compute("key", Duration::from_secs(60), || async {
                Err(FetchError::Unavailable { url: "key".into(), message: "flaky".into() })
            })
            .await
            .unwrap();
        assert_eq!(*value, json!("stale"));

        // a hard 404 is not swallowed, stale copy or not
        let err = cache
            .get_or_compute("key2", Duration::from_secs(60), || async {
                Err(FetchError::NotFound { url: "key2".into() })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn capacity_evictions_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::new(HttpCacheConfig {
            cache_dir: dir.path().to_path_buf(),
            max_entries: 2,
            ..HttpCacheConfig::default()
        })
        .await
        .unwrap();

        for key in ["a", "b", "c"] {
            cache
                .get_or_compute(key, Duration::from_secs(60), || async { Ok(json!(0)) })
                .await
                .unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
    }
}
