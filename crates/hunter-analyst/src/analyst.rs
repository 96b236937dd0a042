//! Persona verdicts from a chat-completion provider

use crate::config::AnalystConfig;
use crate::error::{AnalystError, Result};
use crate::persona::Persona;
use crate::prompts::Prompts;
use crate::verdict::Analysis;
use async_trait::async_trait;
use futures::future::join_all;
use hunter_llm::{CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message};
use hunter_market::StockSnapshot;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stand-in provider used when no API key is configured
///
/// Every call fails with [`LLMError::MissingApiKey`], so the dashboard still
/// renders and each persona card shows the missing key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingKeyProvider;

#[async_trait]
impl LLMProvider for MissingKeyProvider {
    async fn complete(&self, _request: CompletionRequest) -> hunter_llm::Result<CompletionResponse> {
        Err(LLMError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Runs the persona panel against a snapshot
pub struct Analyst {
    provider: Arc<dyn LLMProvider>,
    config: AnalystConfig,
    prompts: Prompts,
}

impl std::fmt::Debug for Analyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyst")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Analyst {
    pub fn new(provider: Arc<dyn LLMProvider>, config: AnalystConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            prompts: Prompts::new()?,
        })
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// One persona's verdict, or the error that prevented it
    #[instrument(skip(self, snapshot), fields(symbol = %snapshot.ticker))]
    pub async fn try_analyze(&self, persona: Persona, snapshot: &StockSnapshot) -> Result<Analysis> {
        let request = CompletionRequest::builder(&self.config.model)
            .system(self.prompts.system(persona)?)
            .add_message(Message::user(self.prompts.user(snapshot)?))
            .temperature(self.config.temperature)
            .seed(self.config.seed)
            .max_tokens(self.config.max_tokens)
            .json_mode()
            .build();

        let response = self.provider.complete(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Analysis::parse(persona, response.text())
    }

    /// One persona's verdict; failures become an error card instead of an `Err`
    pub async fn analyze(&self, persona: Persona, snapshot: &StockSnapshot) -> Analysis {
        match self.try_analyze(persona, snapshot).await {
            Ok(analysis) => analysis,
            Err(AnalystError::Llm(LLMError::MissingApiKey)) => {
                Analysis::error(persona, LLMError::MissingApiKey.to_string())
            }
            Err(e) => {
                warn!(%persona, symbol = %snapshot.ticker, error = %e, "Analysis failed");
                Analysis::error(persona, format!("AI error: {e}"))
            }
        }
    }

    /// Every configured persona, concurrently, in configuration order
    pub async fn analyze_all(&self, snapshot: &StockSnapshot) -> Vec<Analysis> {
        info!(
            symbol = %snapshot.ticker,
            personas = self.config.personas.len(),
            model = %self.config.model,
            "Running persona panel"
        );

        join_all(
            self.config
                .personas
                .iter()
                .map(|persona| self.analyze(*persona, snapshot)),
        )
        .await
    }
}
