//! Broad market banner: index levels, bitcoin and the 10Y yield

use crate::chain::FallbackChain;
use crate::snapshot::{Quote, SourceKind};
use crate::ticker::Ticker;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Instruments shown in the banner, as (label, symbol)
pub const OVERVIEW_SYMBOLS: [(&str, &str); 5] = [
    ("S&P 500", "^GSPC"),
    ("NASDAQ", "^IXIC"),
    ("Bitcoin", "BTC-USD"),
    ("VIX", "^VIX"),
    ("10Y Yield", "^TNX"),
];

/// One banner entry; `quote` is `None` when no source answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewItem {
    pub label: String,
    pub symbol: String,
    pub quote: Option<Quote>,
    pub source: Option<SourceKind>,
}

impl OverviewItem {
    pub fn price(&self) -> Option<f64> {
        self.quote.as_ref().map(|q| q.price)
    }

    pub fn change_pct(&self) -> Option<f64> {
        self.quote.as_ref().and_then(Quote::change_pct)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub items: Vec<OverviewItem>,
}

impl MarketOverview {
    /// Quote every banner instrument concurrently
    ///
    /// Uses the real tiers only; a synthetic index level would be misleading.
    #[instrument(skip(chain))]
    pub async fn fetch(chain: &FallbackChain) -> Self {
        let lookups = OVERVIEW_SYMBOLS.iter().map(|(label, symbol)| async move {
            let quoted = match Ticker::parse(symbol) {
                Ok(ticker) => chain.quote(&ticker).await,
                Err(e) => Err(e),
            };

            let (quote, source) = match quoted {
                Ok((quote, source)) => (Some(quote), Some(source)),
                Err(e) => {
                    debug!(symbol, error = %e, "Overview quote unavailable");
                    (None, None)
                }
            };

            OverviewItem {
                label: (*label).to_string(),
                symbol: (*symbol).to_string(),
                quote,
                source,
            }
        });

        Self {
            items: join_all(lookups).await,
        }
    }

    /// Number of instruments that resolved
    pub fn available(&self) -> usize {
        self.items.iter().filter(|i| i.quote.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MarketError, Result};
    use crate::retry::RetryPolicy;
    use crate::source::{Facet, MarketSource};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Knows indices only
    struct IndexOnly;

    #[async_trait]
    impl MarketSource for IndexOnly {
        fn kind(&self) -> SourceKind {
            SourceKind::YahooChart
        }

        fn supports(&self, facet: Facet) -> bool {
            facet == Facet::Quote
        }

        async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
            if ticker.is_index() {
                Ok(Quote::new(100.0).with_previous_close(Some(80.0)))
            } else {
                Err(MarketError::unavailable(ticker.as_str(), "unknown"))
            }
        }
    }

    #[tokio::test]
    async fn test_overview_keeps_order_and_gaps() {
        let chain = FallbackChain::with_sources(vec![Arc::new(IndexOnly) as Arc<dyn MarketSource>])
            .with_retry(RetryPolicy::no_retry())
            .with_mock_fallback(true);

        let overview = MarketOverview::fetch(&chain).await;

        let symbols: Vec<&str> = overview.items.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["^GSPC", "^IXIC", "BTC-USD", "^VIX", "^TNX"]);
        assert_eq!(overview.available(), 4);

        let bitcoin = &overview.items[2];
        assert_eq!(bitcoin.price(), None);
        assert_eq!(bitcoin.source, None);

        let spx = &overview.items[0];
        assert_eq!(spx.change_pct(), Some(25.0));
        assert_eq!(spx.source, Some(SourceKind::YahooChart));
    }
}
