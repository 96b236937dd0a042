//! Configuration for market data fetching

use crate::error::{MarketError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for `max_retries`
pub const MAX_RETRIES: u32 = 10;

/// Browser user agent; the quote endpoints block default HTTP client agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for market data operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// How long a fetched snapshot stays fresh
    pub cache_ttl: Duration,

    /// Lookback window for price history, in calendar days
    pub history_days: u32,

    /// Maximum attempts per source call
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// User agent sent to the Yahoo endpoints
    pub user_agent: String,

    /// Alpha Vantage API key (optional, enables the keyed tier)
    pub alpha_vantage_api_key: Option<String>,

    /// Alpha Vantage requests per minute
    pub alpha_vantage_rate_limit: u32,

    /// Fall back to synthetic data when no source yields a price
    pub mock_fallback: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            history_days: 180,
            max_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            alpha_vantage_api_key: None,
            alpha_vantage_rate_limit: 5,
            mock_fallback: true,
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Defaults overlaid with environment variables
    ///
    /// Reads `ALPHA_VANTAGE_API_KEY`, `HUNTER_CACHE_TTL_SECS` and
    /// `HUNTER_MOCK_FALLBACK`.
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(MarketError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.max_retries > MAX_RETRIES {
            return Err(MarketError::Config(format!(
                "max_retries must be at most {MAX_RETRIES}"
            )));
        }

        if self.history_days < 2 {
            return Err(MarketError::Config(
                "history_days must be at least 2".to_string(),
            ));
        }

        if self.alpha_vantage_rate_limit == 0 {
            return Err(MarketError::Config(
                "alpha_vantage_rate_limit must be greater than 0".to_string(),
            ));
        }

        if self
            .alpha_vantage_api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            return Err(MarketError::Config(
                "Alpha Vantage API key is set but empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get retry backoff duration for attempt number
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.retry_backoff_base.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Retry policy derived from the retry settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.retry_backoff_base,
            self.retry_backoff(self.max_retries),
            2.0,
        )
    }
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    cache_ttl: Option<Duration>,
    history_days: Option<u32>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    user_agent: Option<String>,
    alpha_vantage_api_key: Option<String>,
    alpha_vantage_rate_limit: Option<u32>,
    mock_fallback: Option<bool>,
}

impl MarketConfigBuilder {
    /// Set cache TTL for snapshots
    pub fn cache_ttl(mut self, duration: Duration) -> Self {
        self.cache_ttl = Some(duration);
        self
    }

    /// Set history lookback in days
    pub fn history_days(mut self, days: u32) -> Self {
        self.history_days = Some(days);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set Alpha Vantage requests per minute
    pub fn alpha_vantage_rate_limit(mut self, per_minute: u32) -> Self {
        self.alpha_vantage_rate_limit = Some(per_minute);
        self
    }

    /// Enable or disable the synthetic last resort
    pub fn mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = Some(enabled);
        self
    }

    /// Overlay values found in the environment (unset fields only)
    pub fn with_env(mut self) -> Self {
        if self.alpha_vantage_api_key.is_none() {
            self.alpha_vantage_api_key = std::env::var("ALPHA_VANTAGE_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.cache_ttl.is_none() {
            self.cache_ttl = hunter_utils::env_u64("HUNTER_CACHE_TTL_SECS").map(Duration::from_secs);
        }
        if self.mock_fallback.is_none() {
            self.mock_fallback = hunter_utils::env_bool("HUNTER_MOCK_FALLBACK");
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            history_days: self.history_days.unwrap_or(defaults.history_days),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            alpha_vantage_rate_limit: self
                .alpha_vantage_rate_limit
                .unwrap_or(defaults.alpha_vantage_rate_limit),
            mock_fallback: self.mock_fallback.unwrap_or(defaults.mock_fallback),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.history_days, 180);
        assert_eq!(config.max_retries, 3);
        assert!(config.mock_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MarketConfig::builder()
            .max_retries(5)
            .request_timeout(Duration::from_secs(60))
            .mock_fallback(false)
            .alpha_vantage_api_key("demo")
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(!config.mock_fallback);
        assert_eq!(config.alpha_vantage_api_key.as_deref(), Some("demo"));
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let config = MarketConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_blank_key() {
        let result = MarketConfig::builder().alpha_vantage_api_key("  ").build();
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[test]
    fn test_retry_backoff() {
        let config = MarketConfig::default();
        assert_eq!(config.retry_backoff(0), Duration::from_millis(500));
        assert_eq!(config.retry_backoff(1), Duration::from_secs(1));
        assert_eq!(config.retry_backoff(2), Duration::from_secs(2));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_validation_caps_retries() {
        let result = MarketConfig::builder().max_retries(40).build();
        assert!(matches!(result, Err(MarketError::Config(_))));

        let config = MarketConfig::builder().max_retries(MAX_RETRIES).build().unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, MAX_RETRIES);
    }

    #[test]
    fn test_retry_backoff_saturates() {
        let config = MarketConfig::default();
        assert_eq!(config.retry_backoff(40), Duration::MAX);
        assert_eq!(config.retry_backoff(u32::MAX), Duration::MAX);

        let config = MarketConfig {
            retry_backoff_base: Duration::from_secs(u64::MAX / 2),
            ..Default::default()
        };
        assert_eq!(config.retry_backoff(2), Duration::MAX);
    }

    #[test]
    fn test_explicit_values_beat_env() {
        unsafe {
            std::env::set_var("HUNTER_MOCK_FALLBACK", "false");
        }
        let config = MarketConfig::builder()
            .mock_fallback(true)
            .with_env()
            .build()
            .unwrap();
        assert!(config.mock_fallback);
        unsafe {
            std::env::remove_var("HUNTER_MOCK_FALLBACK");
        }
    }
}
