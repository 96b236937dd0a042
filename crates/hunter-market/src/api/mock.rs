//! Last resort: a deterministic synthetic dataset
//!
//! Every figure is derived from a hash of the symbol, so the same ticker
//! always yields the same snapshot and tests can assert on it.

use crate::error::Result;
use crate::snapshot::{Fundamentals, PriceHistory, PricePoint, Provenance, Quote, SourceKind, StockSnapshot};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveTime, Utc, Weekday};

/// Synthetic market data
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSource;

/// xorshift64* generator seeded from the symbol
struct Walk(u64);

impl Walk {
    fn for_symbol(symbol: &str) -> Self {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in symbol.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self(hash.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Uniform in [0, 1)
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }

    /// Uniform in [low, high)
    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.unit()
    }
}

impl MockSource {
    /// Weekday closes over the last `days` calendar days, ending at the quote price
    fn series(ticker: &Ticker, days: u32) -> PriceHistory {
        let mut walk = Walk::for_symbol(ticker.as_str());
        let end_price = walk.range(20.0, 500.0);
        let drift = walk.range(-0.002, 0.003);

        let today = Utc::now().date_naive();
        let dates: Vec<_> = (0..=i64::from(days))
            .rev()
            .map(|back| today - Duration::days(back))
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .collect();

        // Walk backwards from the end price so the last close matches the quote
        let mut closes = Vec::with_capacity(dates.len());
        let mut price = end_price;
        for _ in &dates {
            closes.push(price);
            let shock = walk.range(-0.02, 0.02);
            price = (price / (1.0 + drift + shock)).max(1.0);
        }
        closes.reverse();

        PriceHistory::new(
            dates
                .into_iter()
                .zip(closes)
                .map(|(date, close)| PricePoint {
                    timestamp: date.and_time(NaiveTime::MIN).and_utc(),
                    close: (close * 100.0).round() / 100.0,
                })
                .collect(),
        )
    }

    fn synthetic_fundamentals(ticker: &Ticker) -> Fundamentals {
        let mut walk = Walk::for_symbol(ticker.as_str());
        // Skip the draws the price series uses
        let _ = (walk.unit(), walk.unit());

        Fundamentals {
            market_cap: Some((walk.range(5.0, 2_000.0) * 1e9).round()),
            trailing_pe: Some((walk.range(8.0, 60.0) * 10.0).round() / 10.0),
            beta: Some((walk.range(0.6, 1.8) * 100.0).round() / 100.0),
            profit_margins: Some((walk.range(0.02, 0.35) * 1000.0).round() / 1000.0),
            revenue_growth: Some((walk.range(-0.05, 0.40) * 1000.0).round() / 1000.0),
            total_debt: Some((walk.range(0.5, 100.0) * 1e9).round()),
            free_cashflow: Some((walk.range(-2.0, 60.0) * 1e9).round()),
        }
    }

    /// Complete synthetic snapshot, keeping the real sources' failed attempts
    pub fn snapshot(&self, ticker: &Ticker, days: u32, mut provenance: Provenance) -> StockSnapshot {
        let history = Self::series(ticker, days);
        let price = history.last().map_or(100.0, |p| p.close);
        let previous_close = history
            .len()
            .checked_sub(2)
            .map(|i| history.points()[i].close);

        provenance.quote = Some(SourceKind::Mock);
        provenance.history = Some(SourceKind::Mock);
        provenance.fundamentals = vec![SourceKind::Mock];

        StockSnapshot::assemble(
            ticker.clone(),
            Quote::new(price)
                .with_previous_close(previous_close)
                .with_currency(Some("USD".to_string())),
            Some(history),
            Self::synthetic_fundamentals(ticker),
            provenance,
        )
    }
}

#[async_trait]
impl MarketSource for MockSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }

    fn supports(&self, _facet: Facet) -> bool {
        true
    }

    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        Ok(self.snapshot(ticker, 5, Provenance::default()).quote)
    }

    async fn history(&self, ticker: &Ticker, days: u32) -> Result<PriceHistory> {
        Ok(Self::series(ticker, days))
    }

    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        Ok(Self::synthetic_fundamentals(ticker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    #[test]
    fn test_deterministic_per_symbol() {
        let a = MockSource.snapshot(&ticker("NVDA"), 180, Provenance::default());
        let b = MockSource.snapshot(&ticker("NVDA"), 180, Provenance::default());
        let c = MockSource.snapshot(&ticker("AAPL"), 180, Provenance::default());

        assert_eq!(a.history, b.history);
        assert_eq!(a.fundamentals, b.fundamentals);
        assert_ne!(a.price(), c.price());
    }

    #[test]
    fn test_snapshot_is_flagged_and_complete() {
        let mut failed = Provenance::default();
        failed.record_failure(SourceKind::YahooApi, Facet::Quote, "blocked");

        let snapshot = MockSource.snapshot(&ticker("TSLA"), 180, failed);

        assert!(snapshot.is_mock());
        assert!(snapshot.has_history);
        assert!(snapshot.fundamentals.is_complete());
        assert_eq!(snapshot.provenance.attempts.len(), 1);
        assert_eq!(snapshot.provenance.fundamentals, vec![SourceKind::Mock]);
    }

    #[test]
    fn test_series_shape() {
        let history = MockSource::series(&ticker("MSFT"), 180);
        // ~128 weekdays in 181 calendar days
        assert!((120..=132).contains(&history.len()));
        assert!(history.closes().iter().all(|c| *c >= 1.0));

        let snapshot = MockSource.snapshot(&ticker("MSFT"), 180, Provenance::default());
        assert_eq!(Some(snapshot.price()), history.last().map(|p| p.close));
    }

    #[tokio::test]
    async fn test_source_facets() {
        let t = ticker("AMD");
        assert!(MockSource.quote(&t).await.unwrap().is_valid());
        assert!(!MockSource.history(&t, 30).await.unwrap().is_empty());
        assert!(!MockSource.fundamentals(&t).await.unwrap().is_empty());
    }
}
