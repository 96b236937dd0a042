//! The market data source abstraction

use crate::error::{MarketError, Result};
use crate::snapshot::{Fundamentals, PriceHistory, Quote, SourceKind};
use crate::ticker::Ticker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One part of a stock snapshot that sources fetch independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    /// Current price
    Quote,
    /// Daily closes over the lookback window
    History,
    /// Valuation and balance-sheet figures
    Fundamentals,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Facet::Quote => "quote",
            Facet::History => "price history",
            Facet::Fundamentals => "fundamentals",
        })
    }
}

/// A provider of market data
///
/// A source implements the facets it can serve and reports them through
/// [`MarketSource::supports`]. Unsupported facets keep the default body,
/// which returns [`MarketError::Unsupported`].
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Which tier this source is
    fn kind(&self) -> SourceKind;

    /// Whether the source can serve the facet at all
    fn supports(&self, facet: Facet) -> bool;

    /// Latest price
    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        let _ = ticker;
        Err(self.unsupported(Facet::Quote))
    }

    /// Daily closes for the last `days` calendar days
    async fn history(&self, ticker: &Ticker, days: u32) -> Result<PriceHistory> {
        let _ = (ticker, days);
        Err(self.unsupported(Facet::History))
    }

    /// Company fundamentals
    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let _ = ticker;
        Err(self.unsupported(Facet::Fundamentals))
    }

    /// Error for a facet this source does not serve
    fn unsupported(&self, facet: Facet) -> MarketError {
        MarketError::Unsupported {
            provider: self.kind(),
            facet,
        }
    }
}
