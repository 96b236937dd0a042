//! Second tier: raw download of the chart and quoteSummary JSON endpoints

use super::check_status;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::snapshot::{Fundamentals, PriceHistory, PricePoint, Quote, SourceKind};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const PROVIDER: &str = "Yahoo chart";
const SUMMARY_MODULES: &str = "price,summaryDetail,financialData,defaultKeyStatistics";

/// Direct HTTP access to the JSON endpoints behind the Yahoo quote page
#[derive(Debug, Clone)]
pub struct YahooChartSource {
    client: Client,
    base_url: String,
}

impl YahooChartSource {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point at another host, e.g. query2 or a local fixture server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, ticker: &Ticker, url: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!(url, "GET");
        let response = self.client.get(url).query(query).send().await?;
        check_status(PROVIDER, ticker.as_str(), &response)?;
        Ok(response.json().await?)
    }

    async fn chart(&self, ticker: &Ticker, range: &str) -> Result<Value> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let query = [("interval", "1d".to_string()), ("range", range.to_string())];
        self.get_json(ticker, &url, &query).await
    }
}

/// Smallest chart `range` value that covers `days`
fn range_for_days(days: u32) -> &'static str {
    match days {
        0..=5 => "5d",
        6..=31 => "1mo",
        32..=92 => "3mo",
        93..=183 => "6mo",
        184..=366 => "1y",
        367..=731 => "2y",
        _ => "5y",
    }
}

/// First chart result, or the error the endpoint reported
fn chart_result<'a>(symbol: &str, body: &'a Value) -> Result<&'a Value> {
    if let Some(description) = body
        .pointer("/chart/error/description")
        .and_then(Value::as_str)
    {
        return Err(MarketError::unavailable(symbol, description));
    }

    body.pointer("/chart/result/0")
        .filter(|r| !r.is_null())
        .ok_or_else(|| MarketError::unavailable(symbol, "chart response has no result"))
}

/// Price, previous close and currency from the chart `meta` block
pub fn parse_chart_quote(symbol: &str, body: &Value) -> Result<Quote> {
    let meta = chart_result(symbol, body)?
        .get("meta")
        .ok_or_else(|| MarketError::Parse("chart result has no meta".to_string()))?;

    let price = meta
        .get("regularMarketPrice")
        .and_then(Value::as_f64)
        .ok_or_else(|| MarketError::unavailable(symbol, "no regularMarketPrice"))?;

    let previous_close = meta
        .get("chartPreviousClose")
        .or_else(|| meta.get("previousClose"))
        .and_then(Value::as_f64);
    let currency = meta
        .get("currency")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut quote = Quote::new(price)
        .with_previous_close(previous_close)
        .with_currency(currency);
    if let Some(ts) = meta
        .get("regularMarketTime")
        .and_then(Value::as_i64)
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
    {
        quote.timestamp = ts;
    }

    if !quote.is_valid() {
        return Err(MarketError::unavailable(symbol, format!("unusable price {price}")));
    }
    Ok(quote)
}

/// Daily closes from the parallel `timestamp` / `close` arrays
///
/// Closes are null on halted days; those points are skipped.
pub fn parse_chart_history(symbol: &str, body: &Value) -> Result<PriceHistory> {
    let result = chart_result(symbol, body)?;

    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::unavailable(symbol, "chart has no timestamps"))?;
    let closes = result
        .pointer("/indicators/quote/0/close")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketError::unavailable(symbol, "chart has no closes"))?;

    let points = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            Some(PricePoint {
                timestamp: DateTime::from_timestamp(ts.as_i64()?, 0)?,
                close: close.as_f64()?,
            })
        })
        .collect();

    let history = PriceHistory::new(points);
    if history.is_empty() {
        return Err(MarketError::unavailable(symbol, "empty price history"));
    }
    Ok(history)
}

/// `raw` member of a `{"raw": .., "fmt": ..}` field
fn raw(module: Option<&Value>, field: &str) -> Option<f64> {
    let value = module?.get(field)?;
    value
        .get("raw")
        .and_then(Value::as_f64)
        .or_else(|| value.as_f64())
}

/// Fundamentals from a quoteSummary response
pub fn parse_quote_summary(symbol: &str, body: &Value) -> Result<Fundamentals> {
    if let Some(description) = body
        .pointer("/quoteSummary/error/description")
        .and_then(Value::as_str)
    {
        return Err(MarketError::unavailable(symbol, description));
    }

    let result = body
        .pointer("/quoteSummary/result/0")
        .ok_or_else(|| MarketError::unavailable(symbol, "quoteSummary has no result"))?;

    let price = result.get("price");
    let summary = result.get("summaryDetail");
    let financial = result.get("financialData");
    let stats = result.get("defaultKeyStatistics");

    let fundamentals = Fundamentals {
        market_cap: raw(summary, "marketCap").or_else(|| raw(price, "marketCap")),
        trailing_pe: raw(summary, "trailingPE"),
        beta: raw(summary, "beta").or_else(|| raw(stats, "beta")),
        profit_margins: raw(financial, "profitMargins").or_else(|| raw(stats, "profitMargins")),
        revenue_growth: raw(financial, "revenueGrowth"),
        total_debt: raw(financial, "totalDebt"),
        free_cashflow: raw(financial, "freeCashflow"),
    };

    if fundamentals.is_empty() {
        return Err(MarketError::unavailable(symbol, "quoteSummary carried no figures"));
    }
    Ok(fundamentals)
}

#[async_trait]
impl MarketSource for YahooChartSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YahooChart
    }

    fn supports(&self, _facet: Facet) -> bool {
        true
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        let body = self.chart(ticker, "5d").await?;
        parse_chart_quote(ticker.as_str(), &body)
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn history(&self, ticker: &Ticker, days: u32) -> Result<PriceHistory> {
        let body = self.chart(ticker, range_for_days(days)).await?;
        Ok(parse_chart_history(ticker.as_str(), &body)?.trailing_days(days))
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, ticker);
        let query = [("modules", SUMMARY_MODULES.to_string())];
        let body = self.get_json(ticker, &url, &query).await?;
        parse_quote_summary(ticker.as_str(), &body)
    }
}
