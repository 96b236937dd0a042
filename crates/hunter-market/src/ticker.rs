//! Validated ticker symbols

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TICKER_LEN: usize = 15;

/// A normalised ticker symbol (`NVDA`, `BRK.B`, `^GSPC`, `BTC-USD`, `EURUSD=X`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse user input: trims, upper-cases and checks the character set
    pub fn parse(input: &str) -> Result<Self> {
        let symbol = input.trim().to_ascii_uppercase();

        if symbol.is_empty() {
            return Err(MarketError::InvalidSymbol("empty ticker".to_string()));
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(MarketError::InvalidSymbol(format!(
                "{symbol} is longer than {MAX_TICKER_LEN} characters"
            )));
        }
        if let Some(bad) = symbol
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(MarketError::InvalidSymbol(format!(
                "{symbol} contains '{bad}'"
            )));
        }

        Ok(Self(symbol))
    }

    /// The symbol as sent to providers
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Index and macro symbols (`^GSPC`, `^VIX`) have no company fundamentals
    pub fn is_index(&self) -> bool {
        self.0.starts_with('^')
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Ticker {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}
