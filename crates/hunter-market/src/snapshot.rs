//! Market data model

use crate::source::Facet;
use crate::ticker::Ticker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier of the fallback chain produced a piece of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `yahoo_finance_api` client crate
    YahooApi,
    /// Raw chart / quoteSummary JSON download
    YahooChart,
    /// Regex scraping of the quote page
    Scrape,
    /// Alpha Vantage keyed API
    AlphaVantage,
    /// Synthetic last-resort dataset
    Mock,
}

impl SourceKind {
    /// Human readable name
    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::YahooApi => "Yahoo API",
            SourceKind::YahooChart => "Yahoo chart",
            SourceKind::Scrape => "HTML scrape",
            SourceKind::AlphaVantage => "Alpha Vantage",
            SourceKind::Mock => "Mock data",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Latest price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub previous_close: Option<f64>,
    pub currency: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Quote stamped now
    pub fn new(price: f64) -> Self {
        Self {
            price,
            previous_close: None,
            currency: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the previous close
    pub fn with_previous_close(mut self, previous_close: Option<f64>) -> Self {
        self.previous_close = previous_close.filter(|p| p.is_finite() && *p > 0.0);
        self
    }

    /// Set the currency code
    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency;
        self
    }

    /// Day change in percent, when the previous close is known
    pub fn change_pct(&self) -> Option<f64> {
        let prev = self.previous_close?;
        Some((self.price - prev) / prev * 100.0)
    }

    /// A usable price is finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// A single daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Daily closes in chronological order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory(Vec<PricePoint>);

impl PriceHistory {
    /// Build from points in any order; unusable closes are dropped
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self(points)
    }

    /// Keep only points newer than `days` before the last point
    pub fn trailing_days(self, days: u32) -> Self {
        let Some(last) = self.0.last().map(|p| p.timestamp) else {
            return self;
        };
        let cutoff = last - chrono::Duration::days(i64::from(days));
        Self(self.0.into_iter().filter(|p| p.timestamp >= cutoff).collect())
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.0.last()
    }

    pub fn min_close(&self) -> Option<f64> {
        self.0.iter().map(|p| p.close).reduce(f64::min)
    }

    pub fn max_close(&self) -> Option<f64> {
        self.0.iter().map(|p| p.close).reduce(f64::max)
    }

    /// Percentage change from the first to the last close.
    ///
    /// Zero when there are fewer than two points.
    pub fn trend_pct(&self) -> f64 {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) if self.0.len() >= 2 && first.close > 0.0 => {
                (last.close - first.close) / first.close * 100.0
            }
            _ => 0.0,
        }
    }
}

/// Company fundamentals; every field is optional because every source is partial
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub beta: Option<f64>,
    pub profit_margins: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub total_debt: Option<f64>,
    pub free_cashflow: Option<f64>,
}

impl Fundamentals {
    /// Fill fields that are still missing from `other`; present values win
    pub fn merge(&mut self, other: Fundamentals) {
        fn fill(slot: &mut Option<f64>, value: Option<f64>) {
            if slot.is_none() {
                *slot = value.filter(|v| v.is_finite());
            }
        }

        fill(&mut self.market_cap, other.market_cap);
        fill(&mut self.trailing_pe, other.trailing_pe);
        fill(&mut self.beta, other.beta);
        fill(&mut self.profit_margins, other.profit_margins);
        fill(&mut self.revenue_growth, other.revenue_growth);
        fill(&mut self.total_debt, other.total_debt);
        fill(&mut self.free_cashflow, other.free_cashflow);
    }

    fn fields(&self) -> [Option<f64>; 7] {
        [
            self.market_cap,
            self.trailing_pe,
            self.beta,
            self.profit_margins,
            self.revenue_growth,
            self.total_debt,
            self.free_cashflow,
        ]
    }

    /// Every field present
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(Option::is_some)
    }

    /// No field present
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(Option::is_none)
    }
}

/// A failed attempt in the fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub source: SourceKind,
    pub facet: Facet,
    pub error: String,
}

/// Where each facet of a snapshot came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub quote: Option<SourceKind>,
    pub history: Option<SourceKind>,
    pub fundamentals: Vec<SourceKind>,
    pub attempts: Vec<Attempt>,
}

impl Provenance {
    /// Record a failed attempt
    pub fn record_failure(&mut self, source: SourceKind, facet: Facet, error: impl ToString) {
        self.attempts.push(Attempt {
            source,
            facet,
            error: error.to_string(),
        });
    }

    /// Failed attempts for one facet
    pub fn failures(&self, facet: Facet) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter().filter(move |a| a.facet == facet)
    }
}

/// Everything the dashboard and the analysts know about one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub ticker: Ticker,
    pub quote: Quote,
    pub history: PriceHistory,
    /// False when no source could deliver history (degraded mode)
    pub has_history: bool,
    /// Percent change over the lookback window, 0 without history
    pub trend_6m: f64,
    pub fundamentals: Fundamentals,
    pub provenance: Provenance,
    pub fetched_at: DateTime<Utc>,
}

impl StockSnapshot {
    /// Assemble a snapshot and derive the history-dependent fields
    pub fn assemble(
        ticker: Ticker,
        quote: Quote,
        history: Option<PriceHistory>,
        fundamentals: Fundamentals,
        provenance: Provenance,
    ) -> Self {
        let history = history.unwrap_or_default();
        let has_history = !history.is_empty();
        let trend_6m = history.trend_pct();

        Self {
            ticker,
            quote,
            history,
            has_history,
            trend_6m,
            fundamentals,
            provenance,
            fetched_at: Utc::now(),
        }
    }

    pub fn price(&self) -> f64 {
        self.quote.price
    }

    /// Whether the price is synthetic
    pub fn is_mock(&self) -> bool {
        self.provenance.quote == Some(SourceKind::Mock)
    }

    pub fn market_cap(&self) -> f64 {
        self.fundamentals.market_cap.unwrap_or(0.0)
    }

    pub fn trailing_pe(&self) -> f64 {
        self.fundamentals.trailing_pe.unwrap_or(0.0)
    }

    /// Beta defaults to a market-neutral 1.0
    pub fn beta(&self) -> f64 {
        self.fundamentals.beta.unwrap_or(1.0)
    }

    pub fn profit_margins(&self) -> f64 {
        self.fundamentals.profit_margins.unwrap_or(0.0)
    }

    pub fn revenue_growth(&self) -> f64 {
        self.fundamentals.revenue_growth.unwrap_or(0.0)
    }

    pub fn total_debt(&self) -> f64 {
        self.fundamentals.total_debt.unwrap_or(0.0)
    }

    pub fn free_cashflow(&self) -> f64 {
        self.fundamentals.free_cashflow.unwrap_or(0.0)
    }
}
