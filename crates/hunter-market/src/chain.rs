//! The multi-tier fetch fallback chain

use crate::api::{AlphaVantageSource, MockSource, ScrapeSource, YahooApiSource, YahooChartSource};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::retry::RetryPolicy;
use crate::snapshot::{Fundamentals, PriceHistory, Provenance, Quote, SourceKind, StockSnapshot};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Ordered list of sources walked facet by facet
///
/// The quote decides whether a snapshot exists at all; history and
/// fundamentals only degrade it.
#[derive(Clone)]
pub struct FallbackChain {
    sources: Vec<Arc<dyn MarketSource>>,
    mock: Option<MockSource>,
    retry: RetryPolicy,
    history_days: u32,
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("sources", &self.source_kinds())
            .field("mock", &self.mock.is_some())
            .field("retry", &self.retry)
            .field("history_days", &self.history_days)
            .finish()
    }
}

impl FallbackChain {
    /// Chain over explicit sources, no synthetic fallback
    pub fn with_sources(sources: Vec<Arc<dyn MarketSource>>) -> Self {
        Self {
            sources,
            mock: None,
            retry: RetryPolicy::default(),
            history_days: 180,
        }
    }

    /// Wire the standard tiers from configuration
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        config.validate()?;

        let mut sources: Vec<Arc<dyn MarketSource>> = vec![
            Arc::new(YahooApiSource::new()?),
            Arc::new(YahooChartSource::new(config)?),
            Arc::new(ScrapeSource::new(config)?),
        ];
        if let Some(alpha_vantage) = AlphaVantageSource::from_config(config)? {
            sources.push(Arc::new(alpha_vantage));
        }

        let chain = Self::with_sources(sources)
            .with_retry(config.retry_policy())
            .with_history_days(config.history_days)
            .with_mock_fallback(config.mock_fallback);

        debug!(?chain, "Fallback chain ready");
        Ok(chain)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock = enabled.then_some(MockSource);
        self
    }

    pub fn history_days(&self) -> u32 {
        self.history_days
    }

    /// Tier order, as walked
    pub fn source_kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    fn supporting(&self, facet: Facet) -> impl Iterator<Item = &Arc<dyn MarketSource>> {
        self.sources.iter().filter(move |s| s.supports(facet))
    }

    /// Build a full snapshot for `ticker`
    #[instrument(skip(self), fields(symbol = %ticker))]
    pub async fn fetch(&self, ticker: &Ticker) -> Result<StockSnapshot> {
        let mut provenance = Provenance::default();

        let quote = match self.fetch_quote(ticker, &mut provenance).await {
            Some(quote) => quote,
            None => return self.last_resort(ticker, provenance),
        };

        let history = self.fetch_history(ticker, &mut provenance).await;
        if history.is_none() {
            warn!(symbol = %ticker, "No price history from any source, continuing without it");
        }

        let fundamentals = self.fetch_fundamentals(ticker, &mut provenance).await;

        let snapshot = StockSnapshot::assemble(ticker.clone(), quote, history, fundamentals, provenance);
        info!(
            symbol = %ticker,
            price = snapshot.price(),
            has_history = snapshot.has_history,
            quote_source = ?snapshot.provenance.quote,
            "Snapshot assembled"
        );
        Ok(snapshot)
    }

    /// Quote facet only, no synthetic fallback
    #[instrument(skip(self), fields(symbol = %ticker))]
    pub async fn quote(&self, ticker: &Ticker) -> Result<(Quote, SourceKind)> {
        let mut provenance = Provenance::default();
        let quote = self.fetch_quote(ticker, &mut provenance).await;

        match (quote, provenance.quote) {
            (Some(quote), Some(kind)) => Ok((quote, kind)),
            _ => Err(not_found(ticker, &provenance)),
        }
    }

    fn last_resort(&self, ticker: &Ticker, provenance: Provenance) -> Result<StockSnapshot> {
        match &self.mock {
            Some(mock) => {
                warn!(symbol = %ticker, attempts = provenance.attempts.len(), "Every source failed, using synthetic data");
                Ok(mock.snapshot(ticker, self.history_days, provenance))
            }
            None => Err(not_found(ticker, &provenance)),
        }
    }

    async fn fetch_quote(&self, ticker: &Ticker, provenance: &mut Provenance) -> Option<Quote> {
        for source in self.supporting(Facet::Quote) {
            let kind = source.kind();
            let name = format!("{kind} quote");
            match self.retry.execute(&name, || source.quote(ticker)).await {
                Ok(quote) if quote.is_valid() => {
                    debug!(source = %kind, price = quote.price, "Quote");
                    provenance.quote = Some(kind);
                    return Some(quote);
                }
                Ok(quote) => {
                    provenance.record_failure(kind, Facet::Quote, format!("unusable price {}", quote.price));
                }
                Err(e) => {
                    warn!(source = %kind, error = %e, "Quote attempt failed");
                    provenance.record_failure(kind, Facet::Quote, &e);
                }
            }
        }
        None
    }

    async fn fetch_history(&self, ticker: &Ticker, provenance: &mut Provenance) -> Option<PriceHistory> {
        let days = self.history_days;
        for source in self.supporting(Facet::History) {
            let kind = source.kind();
            let name = format!("{kind} history");
            match self.retry.execute(&name, || source.history(ticker, days)).await {
                Ok(history) if !history.is_empty() => {
                    debug!(source = %kind, points = history.len(), "History");
                    provenance.history = Some(kind);
                    return Some(history);
                }
                Ok(_) => provenance.record_failure(kind, Facet::History, "empty price history"),
                Err(e) => {
                    warn!(source = %kind, error = %e, "History attempt failed");
                    provenance.record_failure(kind, Facet::History, &e);
                }
            }
        }
        None
    }

    async fn fetch_fundamentals(&self, ticker: &Ticker, provenance: &mut Provenance) -> Fundamentals {
        let mut merged = Fundamentals::default();
        for source in self.supporting(Facet::Fundamentals) {
            if merged.is_complete() {
                break;
            }

            let kind = source.kind();
            let name = format!("{kind} fundamentals");
            match self.retry.execute(&name, || source.fundamentals(ticker)).await {
                Ok(found) if !found.is_empty() => {
                    debug!(source = %kind, "Fundamentals");
                    merged.merge(found);
                    provenance.fundamentals.push(kind);
                }
                Ok(_) => provenance.record_failure(kind, Facet::Fundamentals, "no figures"),
                Err(e) => {
                    debug!(source = %kind, error = %e, "Fundamentals attempt failed");
                    provenance.record_failure(kind, Facet::Fundamentals, &e);
                }
            }
        }
        merged
    }
}

fn not_found(ticker: &Ticker, provenance: &Provenance) -> MarketError {
    let tried: Vec<String> = provenance
        .failures(Facet::Quote)
        .map(|a| format!("{}: {}", a.source, a.error))
        .collect();
    let reason = if tried.is_empty() {
        "no source provides quotes".to_string()
    } else {
        format!("not found or blocked ({})", tried.join("; "))
    };
    MarketError::unavailable(ticker.as_str(), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted source: serves the facets it is given, fails the rest
    struct FakeSource {
        kind: SourceKind,
        price: Option<f64>,
        history: Option<Vec<f64>>,
        fundamentals: Option<Fundamentals>,
        transient_failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FakeSource {
        fn new(kind: SourceKind) -> Self {
            Self {
                kind,
                price: None,
                history: None,
                fundamentals: None,
                transient_failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }

        fn price(mut self, price: f64) -> Self {
            self.price = Some(price);
            self
        }

        fn history(mut self, closes: &[f64]) -> Self {
            self.history = Some(closes.to_vec());
            self
        }

        fn fundamentals(mut self, fundamentals: Fundamentals) -> Self {
            self.fundamentals = Some(fundamentals);
            self
        }

        fn flaky(self, failures: u32) -> Self {
            self.transient_failures.store(failures, Ordering::SeqCst);
            self
        }

        fn maybe_busy(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.transient_failures.load(Ordering::SeqCst) > 0 {
                self.transient_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(MarketError::Api {
                    provider: self.kind.to_string(),
                    status: Some(503),
                    message: "busy".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MarketSource for FakeSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn supports(&self, _facet: Facet) -> bool {
            true
        }

        async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
            self.maybe_busy()?;
            self.price
                .map(Quote::new)
                .ok_or_else(|| MarketError::unavailable(ticker.as_str(), "blocked"))
        }

        async fn history(&self, ticker: &Ticker, _days: u32) -> Result<PriceHistory> {
            let closes = self
                .history
                .clone()
                .ok_or_else(|| MarketError::unavailable(ticker.as_str(), "no history"))?;
            let start = chrono::Utc::now() - chrono::Duration::days(closes.len() as i64);
            Ok(PriceHistory::new(
                closes
                    .into_iter()
                    .enumerate()
                    .map(|(i, close)| crate::snapshot::PricePoint {
                        timestamp: start + chrono::Duration::days(i as i64),
                        close,
                    })
                    .collect(),
            ))
        }

        async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
            self.fundamentals
                .clone()
                .ok_or_else(|| MarketError::unavailable(ticker.as_str(), "no fundamentals"))
        }
    }

    fn chain(sources: Vec<FakeSource>) -> FallbackChain {
        FallbackChain::with_sources(
            sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn MarketSource>)
                .collect(),
        )
        .with_retry(RetryPolicy::fast())
    }

    fn nvda() -> Ticker {
        Ticker::parse("NVDA").unwrap()
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let chain = chain(vec![
            FakeSource::new(SourceKind::YahooApi).price(100.0).history(&[80.0, 100.0]),
            FakeSource::new(SourceKind::YahooChart).price(999.0).history(&[1.0, 2.0]),
        ]);

        let snapshot = chain.fetch(&nvda()).await.unwrap();
        assert_eq!(snapshot.price(), 100.0);
        assert_eq!(snapshot.provenance.quote, Some(SourceKind::YahooApi));
        assert_eq!(snapshot.provenance.history, Some(SourceKind::YahooApi));
        assert!((snapshot.trend_6m - 25.0).abs() < 1e-9);
        assert!(!snapshot.is_mock());
    }

    #[tokio::test]
    async fn test_falls_through_in_order() {
        let chain = chain(vec![
            FakeSource::new(SourceKind::YahooApi),
            FakeSource::new(SourceKind::YahooChart),
            FakeSource::new(SourceKind::Scrape).price(42.0),
        ]);

        let snapshot = chain.fetch(&nvda()).await.unwrap();
        assert_eq!(snapshot.provenance.quote, Some(SourceKind::Scrape));

        let failed: Vec<SourceKind> = snapshot
            .provenance
            .failures(Facet::Quote)
            .map(|a| a.source)
            .collect();
        assert_eq!(failed, vec![SourceKind::YahooApi, SourceKind::YahooChart]);
    }

    #[tokio::test]
    async fn test_missing_history_degrades() {
        let chain = chain(vec![FakeSource::new(SourceKind::YahooApi).price(10.0)]);

        let snapshot = chain.fetch(&nvda()).await.unwrap();
        assert!(!snapshot.has_history);
        assert_eq!(snapshot.trend_6m, 0.0);
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.provenance.failures(Facet::History).count(), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_merged_across_sources() {
        let partial = Fundamentals {
            market_cap: Some(1e12),
            trailing_pe: Some(30.0),
            ..Default::default()
        };
        let rest = Fundamentals {
            trailing_pe: Some(99.0),
            beta: Some(1.4),
            ..Default::default()
        };

        let chain = chain(vec![
            FakeSource::new(SourceKind::YahooChart).price(10.0).fundamentals(partial),
            FakeSource::new(SourceKind::Scrape).fundamentals(rest),
        ]);

        let snapshot = chain.fetch(&nvda()).await.unwrap();
        assert_eq!(snapshot.fundamentals.trailing_pe, Some(30.0));
        assert_eq!(snapshot.fundamentals.beta, Some(1.4));
        assert_eq!(
            snapshot.provenance.fundamentals,
            vec![SourceKind::YahooChart, SourceKind::Scrape]
        );
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let source = Arc::new(FakeSource::new(SourceKind::YahooApi).price(5.0).flaky(2));
        let chain = FallbackChain::with_sources(vec![source.clone() as Arc<dyn MarketSource>])
            .with_retry(RetryPolicy::fast());

        let (quote, kind) = chain.quote(&nvda()).await.unwrap();
        assert_eq!(quote.price, 5.0);
        assert_eq!(kind, SourceKind::YahooApi);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_fail_without_mock() {
        let chain = chain(vec![
            FakeSource::new(SourceKind::YahooApi),
            FakeSource::new(SourceKind::Scrape),
        ]);

        let err = chain.fetch(&nvda()).await.unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));
        assert!(err.to_string().contains("not found or blocked"));
    }

    #[tokio::test]
    async fn test_all_fail_with_mock() {
        let chain = chain(vec![FakeSource::new(SourceKind::YahooApi)]).with_mock_fallback(true);

        let snapshot = chain.fetch(&nvda()).await.unwrap();
        assert!(snapshot.is_mock());
        assert!(snapshot.has_history);
        assert_eq!(snapshot.provenance.failures(Facet::Quote).count(), 1);
    }

    #[tokio::test]
    async fn test_quote_never_uses_mock() {
        let chain = chain(vec![FakeSource::new(SourceKind::YahooApi)]).with_mock_fallback(true);
        assert!(chain.quote(&nvda()).await.is_err());
    }

    #[test]
    fn test_from_config_tiers() {
        let chain = FallbackChain::from_config(&MarketConfig::default()).unwrap();
        assert_eq!(
            chain.source_kinds(),
            vec![SourceKind::YahooApi, SourceKind::YahooChart, SourceKind::Scrape]
        );

        let config = MarketConfig::builder()
            .alpha_vantage_api_key("demo")
            .mock_fallback(false)
            .build()
            .unwrap();
        let chain = FallbackChain::from_config(&config).unwrap();
        assert_eq!(chain.source_kinds().last(), Some(&SourceKind::AlphaVantage));
        assert!(chain.mock.is_none());
    }
}
