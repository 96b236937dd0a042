//! Market data sources, one per tier of the fallback chain

pub mod alpha_vantage;
pub mod mock;
pub mod scrape;
pub mod yahoo;
pub mod yahoo_chart;

pub use alpha_vantage::AlphaVantageSource;
pub use mock::MockSource;
pub use scrape::ScrapeSource;
pub use yahoo::YahooApiSource;
pub use yahoo_chart::YahooChartSource;

use crate::error::{MarketError, Result};
use reqwest::StatusCode;

/// Turn a non-success HTTP status into a typed error
pub(crate) fn check_status(provider: &str, symbol: &str, response: &reqwest::Response) -> Result<()> {
    status_error(provider, symbol, response.status()).map_or(Ok(()), Err)
}

fn status_error(provider: &str, symbol: &str, status: StatusCode) -> Option<MarketError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::NOT_FOUND => MarketError::unavailable(symbol, format!("{provider} returned 404")),
        StatusCode::TOO_MANY_REQUESTS => MarketError::RateLimitExceeded {
            provider: provider.to_string(),
        },
        _ => MarketError::Api {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: status.canonical_reason().unwrap_or("request failed").to_string(),
        },
    })
}
