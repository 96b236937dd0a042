//! Fourth tier: the Alpha Vantage keyed API
//!
//! The free tier allows a handful of calls per minute, so every request
//! waits on a shared `governor` rate limiter first.

use super::check_status;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::snapshot::{Fundamentals, PriceHistory, PricePoint, Quote, SourceKind};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::instrument;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Quote, daily history and company overview from Alpha Vantage
#[derive(Debug, Clone)]
pub struct AlphaVantageSource {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageSource {
    /// `rate_limit` is requests per minute; zero falls back to the free tier's 5
    pub fn new(api_key: impl Into<String>, rate_limit: u32, config: &MarketConfig) -> Result<Self> {
        let per_minute = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN.saturating_add(4));
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            rate_limiter,
        })
    }

    /// Build from the configured key, or `None` when no key is set
    pub fn from_config(config: &MarketConfig) -> Result<Option<Self>> {
        config
            .alpha_vantage_api_key
            .as_deref()
            .map(|key| Self::new(key, config.alpha_vantage_rate_limit, config))
            .transpose()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(&self, ticker: &Ticker, function: &str, extra: &[(&str, &str)]) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let mut query = vec![
            ("function", function),
            ("symbol", ticker.as_str()),
            ("apikey", self.api_key.as_str()),
        ];
        query.extend_from_slice(extra);

        let response = self.client.get(&self.base_url).query(&query).send().await?;
        check_status(PROVIDER, ticker.as_str(), &response)?;

        let body: Value = response.json().await?;
        check_payload(ticker.as_str(), &body)?;
        Ok(body)
    }
}

/// Alpha Vantage reports errors in a 200 body
fn check_payload(symbol: &str, body: &Value) -> Result<()> {
    if let Some(message) = body.get("Error Message").and_then(Value::as_str) {
        return Err(MarketError::unavailable(symbol, message));
    }

    // "Note" is the per-minute throttle, "Information" the daily quota
    if body.get("Note").is_some() || body.get("Information").is_some() {
        return Err(MarketError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        });
    }

    Ok(())
}

/// Numbers arrive as strings, with "None" or "-" for missing values
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// GLOBAL_QUOTE response
pub fn parse_global_quote(symbol: &str, body: &Value) -> Result<Quote> {
    let quote = body
        .get("Global Quote")
        .filter(|q| q.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or_else(|| MarketError::unavailable(symbol, "empty Global Quote"))?;

    let price = number(quote.get("05. price"))
        .ok_or_else(|| MarketError::Parse("Global Quote has no price".to_string()))?;

    let quote = Quote::new(price).with_previous_close(number(quote.get("08. previous close")));
    if !quote.is_valid() {
        return Err(MarketError::unavailable(symbol, format!("unusable price {price}")));
    }
    Ok(quote)
}

/// TIME_SERIES_DAILY response, keyed by `YYYY-MM-DD`
pub fn parse_daily_series(symbol: &str, body: &Value) -> Result<PriceHistory> {
    let series = body
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .ok_or_else(|| MarketError::unavailable(symbol, "no daily time series"))?;

    let points = series
        .iter()
        .filter_map(|(date, values)| {
            let timestamp = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)?
                .and_utc();
            Some(PricePoint {
                timestamp,
                close: number(values.get("4. close"))?,
            })
        })
        .collect();

    let history = PriceHistory::new(points);
    if history.is_empty() {
        return Err(MarketError::unavailable(symbol, "empty daily time series"));
    }
    Ok(history)
}

/// OVERVIEW response
pub fn parse_overview(symbol: &str, body: &Value) -> Result<Fundamentals> {
    let fundamentals = Fundamentals {
        market_cap: number(body.get("MarketCapitalization")),
        trailing_pe: number(body.get("PERatio")),
        beta: number(body.get("Beta")),
        profit_margins: number(body.get("ProfitMargin")),
        revenue_growth: number(body.get("QuarterlyRevenueGrowthYOY")),
        total_debt: None,
        free_cashflow: None,
    };

    if fundamentals.is_empty() {
        return Err(MarketError::unavailable(symbol, "empty company overview"));
    }
    Ok(fundamentals)
}

#[async_trait]
impl MarketSource for AlphaVantageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::AlphaVantage
    }

    fn supports(&self, _facet: Facet) -> bool {
        true
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        let body = self.call(ticker, "GLOBAL_QUOTE", &[]).await?;
        parse_global_quote(ticker.as_str(), &body)
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn history(&self, ticker: &Ticker, days: u32) -> Result<PriceHistory> {
        // compact = last 100 trading days
        let outputsize = if days > 100 { "full" } else { "compact" };
        let body = self
            .call(ticker, "TIME_SERIES_DAILY", &[("outputsize", outputsize)])
            .await?;
        Ok(parse_daily_series(ticker.as_str(), &body)?.trailing_days(days))
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let body = self.call(ticker, "OVERVIEW", &[]).await?;
        parse_overview(ticker.as_str(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_global_quote() {
        let body = json!({
            "Global Quote": {
                "01. symbol": "IBM",
                "05. price": "221.1000",
                "08. previous close": "219.5000",
                "10. change percent": "0.7289%"
            }
        });

        let quote = parse_global_quote("IBM", &body).unwrap();
        assert_eq!(quote.price, 221.1);
        assert_eq!(quote.previous_close, Some(219.5));
    }

    #[test]
    fn test_empty_global_quote_is_unavailable() {
        let body = json!({ "Global Quote": {} });
        assert!(matches!(
            parse_global_quote("ZZZZ", &body),
            Err(MarketError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_parse_daily_series() {
        let body = json!({
            "Meta Data": { "2. Symbol": "IBM" },
            "Time Series (Daily)": {
                "2025-01-03": { "4. close": "110.0" },
                "2025-01-02": { "4. close": "100.0" },
                "2025-01-06": { "4. close": "None" }
            }
        });

        let history = parse_daily_series("IBM", &body).unwrap();
        assert_eq!(history.closes(), vec![100.0, 110.0]);
    }

    #[test]
    fn test_parse_overview() {
        let body = json!({
            "Symbol": "IBM",
            "MarketCapitalization": "205000000000",
            "PERatio": "22.5",
            "Beta": "0.7",
            "ProfitMargin": "0.12",
            "QuarterlyRevenueGrowthYOY": "-0.01",
            "DividendYield": "None"
        });

        let f = parse_overview("IBM", &body).unwrap();
        assert_eq!(f.market_cap, Some(205_000_000_000.0));
        assert_eq!(f.trailing_pe, Some(22.5));
        assert_eq!(f.revenue_growth, Some(-0.01));
        assert_eq!(f.total_debt, None);
    }

    #[test]
    fn test_payload_errors() {
        let err = check_payload("X", &json!({ "Error Message": "Invalid API call" })).unwrap_err();
        assert!(matches!(err, MarketError::DataUnavailable { .. }));

        let err = check_payload("X", &json!({ "Note": "Thank you for using Alpha Vantage!" })).unwrap_err();
        assert!(err.is_transient());

        let err = check_payload("X", &json!({ "Information": "daily limit" })).unwrap_err();
        assert!(matches!(err, MarketError::RateLimitExceeded { .. }));

        assert!(check_payload("X", &json!({ "Global Quote": {} })).is_ok());
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(AlphaVantageSource::from_config(&MarketConfig::default()).unwrap().is_none());

        let config = MarketConfig::builder().alpha_vantage_api_key("demo").build().unwrap();
        let source = AlphaVantageSource::from_config(&config).unwrap().unwrap();
        assert_eq!(source.kind(), SourceKind::AlphaVantage);
    }
}
