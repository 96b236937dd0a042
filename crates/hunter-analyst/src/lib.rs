//! Investor-persona verdicts for ai-hunter
//!
//! Turns a [`StockSnapshot`](hunter_market::StockSnapshot) into a prompt,
//! sends it to a chat-completion endpoint once per [`Persona`], and turns the
//! reply into an [`Analysis`]: a BUY/HOLD/SELL [`Verdict`] that always agrees
//! with its 0-100 score, a one-line thesis and a [`Risk`] level.
//!
//! # Example
//!
//! ```rust,no_run
//! use hunter_analyst::{AnalystConfig, Analyst, Report};
//! use hunter_llm::providers::OpenAIProvider;
//! use hunter_market::{MarketConfig, MarketService, Ticker};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let market = MarketService::new(MarketConfig::default())?;
//! let snapshot = market.snapshot(&Ticker::parse("NVDA")?).await?;
//!
//! let analyst = Analyst::new(Arc::new(OpenAIProvider::from_env()?), AnalystConfig::default())?;
//! let analyses = analyst.analyze_all(&snapshot).await;
//!
//! Report::from_analyses(&snapshot.ticker, &analyses).save("report.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod analyst;
pub mod chat;
pub mod config;
pub mod error;
pub mod persona;
pub mod prompts;
pub mod report;
pub mod verdict;

pub use analyst::{Analyst, MissingKeyProvider};
pub use chat::{ChatSession, ConversationManager, ConversationTurn, analysis_context};
pub use config::AnalystConfig;
pub use error::{AnalystError, Result};
pub use persona::Persona;
pub use prompts::{PromptFacts, Prompts};
pub use report::{Report, ReportRow};
pub use verdict::{Analysis, Risk, Verdict, extract_json};
