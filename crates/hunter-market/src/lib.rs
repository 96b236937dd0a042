//! Market data layer for ai-hunter
//!
//! The only real decision logic of the application lives here: a
//! multi-tier fetch fallback chain. For each facet of a
//! [`StockSnapshot`] (quote, price history, fundamentals) the
//! [`FallbackChain`] walks its sources in order:
//!
//! 1. `YahooApiSource`: the `yahoo_finance_api` client crate
//! 2. `YahooChartSource`: raw JSON download of the chart/quoteSummary endpoints
//! 3. `ScrapeSource`: regex scraping of the public quote page
//! 4. `AlphaVantageSource`: a second, keyed API (only when configured)
//!
//! and, when every real source fails to produce a price, falls back to a
//! deterministic synthetic dataset from `MockSource`.
//!
//! # Example
//!
//! ```rust,no_run
//! use hunter_market::{MarketConfig, MarketService, Ticker};
//!
//! #[tokio::main]
//! async fn main() -> hunter_market::Result<()> {
//!     let service = MarketService::new(MarketConfig::from_env()?)?;
//!     let snapshot = service.snapshot(&Ticker::parse("nvda")?).await?;
//!     println!("{} ${:.2} ({:+.1}% 6M)", snapshot.ticker, snapshot.price(), snapshot.trend_6m);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod overview;
pub mod retry;
pub mod service;
pub mod snapshot;
pub mod source;
pub mod ticker;

pub use cache::{CacheKey, SnapshotCache};
pub use chain::FallbackChain;
pub use config::{MarketConfig, MarketConfigBuilder};
pub use error::{MarketError, Result};
pub use overview::{MarketOverview, OverviewItem};
pub use retry::RetryPolicy;
pub use service::MarketService;
pub use snapshot::{
    Attempt, Fundamentals, PriceHistory, PricePoint, Provenance, Quote, SourceKind, StockSnapshot,
};
pub use source::{Facet, MarketSource};
pub use ticker::Ticker;
