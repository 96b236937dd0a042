//! Time-bounded snapshot cache

use crate::snapshot::StockSnapshot;
use crate::ticker::Ticker;
use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key for a snapshot request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Normalised symbol
    pub symbol: String,
    /// History lookback the snapshot was built with
    pub history_days: u32,
}

impl CacheKey {
    pub fn new(ticker: &Ticker, history_days: u32) -> Self {
        Self {
            symbol: ticker.as_str().to_string(),
            history_days,
        }
    }
}

/// Thread-safe TTL cache of assembled snapshots
///
/// Clones share the same underlying storage.
#[derive(Clone)]
pub struct SnapshotCache {
    cache: Arc<RwLock<TimedCache<CacheKey, StockSnapshot>>>,
    ttl: Duration,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SnapshotCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh snapshot; expired entries count as absent
    pub async fn get(&self, key: &CacheKey) -> Option<StockSnapshot> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, snapshot: StockSnapshot) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, snapshot);
    }

    /// Return the cached snapshot or run `fetcher`
    ///
    /// Only real data is stored: a synthetic snapshot is handed back to the
    /// caller but never cached, so the next request tries the network again.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<StockSnapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StockSnapshot, E>>,
    {
        if let Some(snapshot) = self.get(&key).await {
            debug!(symbol = %key.symbol, "Cache hit");
            return Ok(snapshot);
        }

        debug!(symbol = %key.symbol, "Cache miss");
        let snapshot = fetcher().await?;

        if snapshot.is_mock() {
            debug!(symbol = %key.symbol, "Not caching synthetic snapshot");
        } else {
            self.insert(key, snapshot.clone()).await;
        }

        Ok(snapshot)
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
