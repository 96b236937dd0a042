//! Cached access to snapshots

use crate::cache::{CacheKey, SnapshotCache};
use crate::chain::FallbackChain;
use crate::config::MarketConfig;
use crate::error::Result;
use crate::overview::MarketOverview;
use crate::snapshot::StockSnapshot;
use crate::ticker::Ticker;
use tracing::info;

/// Fallback chain behind a TTL cache
#[derive(Clone, Debug)]
pub struct MarketService {
    chain: FallbackChain,
    cache: SnapshotCache,
}

impl MarketService {
    pub fn new(config: MarketConfig) -> Result<Self> {
        let chain = FallbackChain::from_config(&config)?;
        Ok(Self::with_chain(chain, SnapshotCache::new(config.cache_ttl)))
    }

    pub fn with_chain(chain: FallbackChain, cache: SnapshotCache) -> Self {
        Self { chain, cache }
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    fn key(&self, ticker: &Ticker) -> CacheKey {
        CacheKey::new(ticker, self.chain.history_days())
    }

    /// Cached snapshot when fresh, otherwise walk the chain
    pub async fn snapshot(&self, ticker: &Ticker) -> Result<StockSnapshot> {
        self.cache
            .get_or_fetch(self.key(ticker), || self.chain.fetch(ticker))
            .await
    }

    /// Drop the cached snapshot and fetch again
    pub async fn refresh(&self, ticker: &Ticker) -> Result<StockSnapshot> {
        info!(symbol = %ticker, "Refreshing snapshot");
        self.cache.invalidate(&self.key(ticker)).await;
        self.snapshot(ticker).await
    }

    pub async fn overview(&self) -> MarketOverview {
        MarketOverview::fetch(&self.chain).await
    }
}
