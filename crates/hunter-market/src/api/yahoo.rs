//! First tier: the `yahoo_finance_api` client crate

use crate::error::{MarketError, Result};
use crate::snapshot::{PriceHistory, PricePoint, Quote, SourceKind};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::instrument;
use yahoo_finance_api as yahoo;

/// Quotes and daily history through the Yahoo Finance client
pub struct YahooApiSource {
    connector: yahoo::YahooConnector,
}

impl YahooApiSource {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new().map_err(yahoo_error)?;
        Ok(Self { connector })
    }
}

fn yahoo_error(e: yahoo::YahooError) -> MarketError {
    MarketError::YahooFinance(e.to_string())
}

fn to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now)
}

#[async_trait]
impl MarketSource for YahooApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YahooApi
    }

    fn supports(&self, facet: Facet) -> bool {
        matches!(facet, Facet::Quote | Facet::History)
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        let response = self
            .connector
            .get_latest_quotes(ticker.as_str(), "1d")
            .await
            .map_err(yahoo_error)?;

        let quotes = response.quotes().map_err(yahoo_error)?;
        let last = quotes
            .last()
            .ok_or_else(|| MarketError::unavailable(ticker.as_str(), "empty quote series"))?;
        let previous_close = quotes.len().checked_sub(2).map(|i| quotes[i].close);

        let mut quote = Quote::new(last.close).with_previous_close(previous_close);
        quote.timestamp = to_datetime(last.timestamp as i64);

        if !quote.is_valid() {
            return Err(MarketError::unavailable(
                ticker.as_str(),
                format!("unusable price {}", last.close),
            ));
        }
        Ok(quote)
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn history(&self, ticker: &Ticker, days: u32) -> Result<PriceHistory> {
        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(i64::from(days));

        let response = self
            .connector
            .get_quote_history(ticker.as_str(), start, end)
            .await
            .map_err(yahoo_error)?;
        let quotes = response.quotes().map_err(yahoo_error)?;

        let history = PriceHistory::new(
            quotes
                .iter()
                .map(|q| PricePoint {
                    timestamp: to_datetime(q.timestamp as i64),
                    close: q.close,
                })
                .collect(),
        );

        if history.is_empty() {
            return Err(MarketError::unavailable(ticker.as_str(), "empty price history"));
        }
        Ok(history)
    }
}
