//! Error types for market data operations

use crate::snapshot::SourceKind;
use crate::source::Facet;
use thiserror::Error;

/// Market data specific errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// The source does not provide this facet
    #[error("{provider} does not provide {facet}")]
    Unsupported { provider: SourceKind, facet: Facet },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Non-success HTTP status or an error payload from a provider
    #[error("{provider} error{}: {message}", .status.as_ref().map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Yahoo Finance client error
    #[error("Yahoo Finance error: {0}")]
    YahooFinance(String),

    /// Response could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarketError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            MarketError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MarketError::RateLimitExceeded { .. } => true,
            MarketError::Api {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Shorthand for a data-unavailable error
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        MarketError::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;
