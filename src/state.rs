//! Per-facade application state.
//!
//! Everything a request handler needs is carried here: the dialect, the
//! upstream cache, the name index, the filter-result cache, and the
//! entity state store. Multiple facade instances in one process must not
//! share state; each gets its own cache directory via its config.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::info;
use tracing::warn;

use prism_cache::HttpCache;
use prism_cache::HttpCacheConfig;
use prism_index::FilterResultCache;
use prism_index::NameIndex;
use prism_index::NameSnapshot;

use crate::config::FacadeConfig;
use crate::ecosystems::Ecosystem;
use crate::entity_store::EntityStore;

/// Shared state for one facade.
#[derive(Clone)]
pub struct AppState {
    /// Facade configuration.
    pub config: Arc<FacadeConfig>,
    /// The upstream dialect.
    pub ecosystem: Arc<dyn Ecosystem>,
    /// Upstream HTTP client and cache tiers.
    pub cache: Arc<HttpCache>,
    /// Name index (loading until the corpus task finishes).
    pub index: Arc<NameIndex>,
    /// Evaluated filter pages.
    pub filter_cache: Arc<FilterResultCache>,
    /// Synthetic epoch/timestamp store.
    pub entities: Arc<EntityStore>,
    /// Process start, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Build state and kick off the background corpus load.
    pub async fn new(config: FacadeConfig) -> anyhow::Result<Self> {
        let ecosystem = config.ecosystem.build();
        Self::with_ecosystem(config, ecosystem).await
    }

    /// Build state around an explicit dialect instance (tests, mirrors).
    pub async fn with_ecosystem(
        config: FacadeConfig,
        ecosystem: Arc<dyn Ecosystem>,
    ) -> anyhow::Result<Self> {
        let cache = HttpCache::new(HttpCacheConfig {
            cache_dir: config.cache_dir.clone(),
            ..HttpCacheConfig::default()
        })
        .await
        .with_context(|| format!("opening cache directory {}", config.cache_dir.display()))?;

        let state = Self {
            ecosystem,
            config: Arc::new(config),
            cache,
            index: Arc::new(NameIndex::new()),
            filter_cache: Arc::new(FilterResultCache::new()),
            entities: Arc::new(EntityStore::new()),
            started_at: Instant::now(),
        };

        state.spawn_corpus_load();
        Ok(state)
    }

    /// Index construction is asynchronous and never blocks serving; until
    /// it finishes, queries degrade to the upstream search fallback.
    fn spawn_corpus_load(&self) {
        let state = self.clone();
        tokio::spawn(async move {
            let snapshot_path = state.config.cache_dir.join("index").join("names.snapshot");

            if let Ok(text) = tokio::fs::read_to_string(&snapshot_path).await {
                let snapshot = NameSnapshot::from_lines(&text);
                if !snapshot.is_empty() {
                    info!(names = snapshot.len(), path = %snapshot_path.display(), "loaded name index snapshot from disk");
                    state.index.install(snapshot);
                    return;
                }
            }

            match state.ecosystem.load_corpus(&state.cache).await {
                Ok(names) if !names.is_empty() => {
                    let snapshot = NameSnapshot::from_names(names);
                    if let Some(parent) = snapshot_path.parent() {
                        let persisted = tokio::fs::create_dir_all(parent).await;
                        if persisted.is_ok() {
                            if let Err(e) =
                                tokio::fs::write(&snapshot_path, snapshot.to_lines()).await
                            {
                                warn!(error = %e, "failed to persist name index snapshot");
                            }
                        }
                    }
                    state.index.install(snapshot);
                }
                Ok(_) => {
                    warn!("corpus load returned no names; staying on upstream search fallback");
                }
                Err(e) => {
                    warn!(error = %e, "corpus load failed; staying on upstream search fallback");
                }
            }
        });
    }
}
