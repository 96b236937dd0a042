//! Third tier: regex scraping of the public quote page
//!
//! The page carries the live figures twice: as `<fin-streamer>` elements
//! with `data-field`/`data-value` attributes, and inside embedded JSON as
//! `"field":{"raw":N,"fmt":".."}`. Streamer values win; the embedded JSON
//! fills the rest, read only from objects keyed by or naming the symbol.

use super::check_status;
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::snapshot::{Fundamentals, Quote, SourceKind};
use crate::source::{Facet, MarketSource};
use crate::ticker::Ticker;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://finance.yahoo.com";
const PROVIDER: &str = "HTML scrape";

/// How long a scraped page serves both the quote and fundamentals facets
const PAGE_TTL: Duration = Duration::from_secs(30);

/// Field values found on one quote page
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageFields(HashMap<String, f64>);

impl PageFields {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn quote(&self) -> Option<Quote> {
        let quote = Quote::new(self.get("regularMarketPrice")?)
            .with_previous_close(self.get("regularMarketPreviousClose"));
        quote.is_valid().then_some(quote)
    }

    pub fn fundamentals(&self) -> Fundamentals {
        Fundamentals {
            market_cap: self.get("marketCap"),
            trailing_pe: self.get("trailingPE"),
            beta: self.get("beta"),
            profit_margins: self.get("profitMargins"),
            revenue_growth: self.get("revenueGrowth"),
            total_debt: self.get("totalDebt"),
            free_cashflow: self.get("freeCashflow"),
        }
    }
}

/// Extracts [`PageFields`] from quote page HTML
#[derive(Debug, Clone)]
pub struct PageParser {
    streamer: Regex,
    attribute: Regex,
    embedded: Regex,
}

impl PageParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| MarketError::Config(format!("Invalid scrape pattern: {e}")))
        };

        Ok(Self {
            streamer: compile(r"<fin-streamer\b([^>]*)>")?,
            attribute: compile(r#"([\w-]+)="([^"]*)""#)?,
            embedded: compile(r#"\\?"(\w+)\\?":\{\\?"raw\\?":(-?[0-9][0-9.eE+-]*)"#)?,
        })
    }

    /// Collect every numeric field that belongs to `symbol`
    pub fn parse(&self, symbol: &str, html: &str) -> PageFields {
        let mut fields = HashMap::new();

        for element in self.streamer.captures_iter(html) {
            let attrs: HashMap<&str, &str> = self
                .attribute
                .captures_iter(&element[1])
                .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
                .collect();

            // Pages embed streamers for other symbols (indices, peers)
            if attrs
                .get("data-symbol")
                .is_some_and(|s| !s.eq_ignore_ascii_case(symbol))
            {
                continue;
            }

            let Some(field) = attrs.get("data-field") else {
                continue;
            };
            let Some(value) = attrs
                .get("data-value")
                .or_else(|| attrs.get("value"))
                .and_then(|v| parse_number(v))
            else {
                continue;
            };
            fields.entry((*field).to_string()).or_insert(value);
        }

        for block in symbol_blocks(symbol, html) {
            for capture in self.embedded.captures_iter(block) {
                if let Ok(value) = capture[2].parse::<f64>() {
                    fields.entry(capture[1].to_string()).or_insert(value);
                }
            }
        }

        PageFields(fields)
    }
}

/// JSON objects on the page that belong to `symbol`
///
/// Matches `"SYM":{..}` and the object enclosing `"symbol":"SYM"`, in plain
/// and backslash-escaped form.
fn symbol_blocks<'a>(symbol: &str, html: &'a str) -> Vec<&'a str> {
    let symbol = symbol.to_ascii_uppercase();
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for quote in ["\"", "\\\""] {
        let keyed = format!("{quote}{symbol}{quote}:{{");
        for (at, _) in html.match_indices(&keyed) {
            let start = at + keyed.len() - 1;
            spans.push((start, object_end(html, start)));
        }

        let named = format!("{quote}symbol{quote}:{quote}{symbol}{quote}");
        for (at, _) in html.match_indices(&named) {
            if let Some(start) = object_start(html, at) {
                spans.push((start, object_end(html, start)));
            }
        }
    }

    spans.sort_unstable();
    spans.dedup();
    spans.into_iter().map(|(start, end)| &html[start..end]).collect()
}

/// Offset of the `{` opening the object that contains `pos`
fn object_start(text: &str, pos: usize) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, byte) in text.as_bytes()[..pos].iter().enumerate().rev() {
        match byte {
            b'}' => depth += 1,
            b'{' if depth == 0 => return Some(i),
            b'{' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Offset just past the `}` closing the object opened at `start`
fn object_end(text: &str, start: usize) -> usize {
    let mut depth = 0_usize;
    for (i, byte) in text.as_bytes().iter().enumerate().skip(start) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

/// Parse a display number: `1,234.5`, `3.2T`, `(1.5B)`, `12.4%`
///
/// Percentages stay in percent units; suffixes scale by powers of a thousand.
pub fn parse_number(text: &str) -> Option<f64> {
    let mut s = text.trim().replace(',', "");
    if s.is_empty() || s == "N/A" || s == "--" {
        return None;
    }

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s[1..s.len() - 1].to_string();
    }
    let s = s.trim_end_matches('%');

    let (digits, scale) = match s.chars().last()? {
        'K' | 'k' => (&s[..s.len() - 1], 1e3),
        'M' => (&s[..s.len() - 1], 1e6),
        'B' => (&s[..s.len() - 1], 1e9),
        'T' => (&s[..s.len() - 1], 1e12),
        _ => (s, 1.0),
    };

    let value = digits.parse::<f64>().ok()? * scale;
    value.is_finite().then_some(if negative { -value } else { value })
}

/// Last page scraped, shared by the quote and fundamentals facets
#[derive(Debug)]
struct ScrapedPage {
    ticker: Ticker,
    fetched_at: Instant,
    fields: PageFields,
}

/// Quote and fundamentals scraped from the HTML quote page
#[derive(Debug)]
pub struct ScrapeSource {
    client: Client,
    parser: PageParser,
    base_url: String,
    last_page: Mutex<Option<ScrapedPage>>,
}

impl ScrapeSource {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            parser: PageParser::new()?,
            base_url: BASE_URL.to_string(),
            last_page: Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fields for `ticker`, reusing the last page while it is fresh
    async fn page(&self, ticker: &Ticker) -> Result<PageFields> {
        // Held across the fetch so concurrent facets share one download
        let mut last_page = self.last_page.lock().await;
        if let Some(page) = last_page
            .as_ref()
            .filter(|p| p.ticker == *ticker && p.fetched_at.elapsed() < PAGE_TTL)
        {
            debug!("Reusing scraped quote page");
            return Ok(page.fields.clone());
        }

        let fields = self.fetch_page(ticker).await?;
        *last_page = Some(ScrapedPage {
            ticker: ticker.clone(),
            fetched_at: Instant::now(),
            fields: fields.clone(),
        });
        Ok(fields)
    }

    async fn fetch_page(&self, ticker: &Ticker) -> Result<PageFields> {
        let url = format!("{}/quote/{}/", self.base_url, ticker);
        let response = self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;
        check_status(PROVIDER, ticker.as_str(), &response)?;

        let html = response.text().await?;
        let fields = self.parser.parse(ticker.as_str(), &html);
        debug!(bytes = html.len(), fields = fields.len(), "Scraped quote page");

        if fields.is_empty() {
            // Consent walls and bot checks come back as 200 with no figures
            return Err(MarketError::unavailable(ticker.as_str(), "quote page carried no data"));
        }
        Ok(fields)
    }
}

#[async_trait]
impl MarketSource for ScrapeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    fn supports(&self, facet: Facet) -> bool {
        matches!(facet, Facet::Quote | Facet::Fundamentals)
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn quote(&self, ticker: &Ticker) -> Result<Quote> {
        self.page(ticker)
            .await?
            .quote()
            .ok_or_else(|| MarketError::unavailable(ticker.as_str(), "no price on quote page"))
    }

    #[instrument(skip(self), fields(symbol = %ticker))]
    async fn fundamentals(&self, ticker: &Ticker) -> Result<Fundamentals> {
        let fundamentals = self.page(ticker).await?.fundamentals();
        if fundamentals.is_empty() {
            return Err(MarketError::unavailable(ticker.as_str(), "no fundamentals on quote page"));
        }
        Ok(fundamentals)
    }
}
