//! Follow-up chat about an analysed ticker
//!
//! A [`ChatSession`] keeps the snapshot and the latest verdicts as a fixed
//! context, and replays the recent turns from its [`ConversationManager`]
//! with every question.

use crate::analyst::Analyst;
use crate::config::AnalystConfig;
use crate::error::{AnalystError, Result};
use crate::prompts::{PromptFacts, Prompts};
use crate::verdict::Analysis;
use chrono::{DateTime, Utc};
use hunter_llm::{CompletionRequest, LLMProvider, Message};
use hunter_market::StockSnapshot;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Maximum number of conversation turns to keep in history
const MAX_HISTORY_SIZE: usize = 50;

/// A single question/answer exchange
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: String, answer: String) -> Self {
        Self {
            question,
            answer,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded conversation history
#[derive(Debug)]
pub struct ConversationManager {
    history: VecDeque<ConversationTurn>,
    max_history: usize,
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::with_max_history(MAX_HISTORY_SIZE)
    }

    /// Create with custom history size
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Add a turn, dropping the oldest ones past the limit
    pub fn add_turn(&mut self, question: String, answer: String) {
        self.history.push_back(ConversationTurn::new(question, answer));

        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> &VecDeque<ConversationTurn> {
        &self.history
    }

    /// The last N turns, newest first
    pub fn last_turns(&self, n: usize) -> Vec<&ConversationTurn> {
        self.history.iter().rev().take(n).collect()
    }

    /// The last N turns as alternating user/assistant messages, oldest first
    pub fn as_messages(&self, n: usize) -> Vec<Message> {
        let skip = self.history.len().saturating_sub(n);
        self.history
            .iter()
            .skip(skip)
            .flat_map(|turn| {
                [
                    Message::user(turn.question.clone()),
                    Message::assistant(turn.answer.clone()),
                ]
            })
            .collect()
    }

    /// Format recent history as a string for context
    pub fn format_recent_context(&self, n: usize) -> String {
        let turns = self.last_turns(n);
        if turns.is_empty() {
            return String::new();
        }

        let mut context = String::from("Recent conversation:\n");
        for (i, turn) in turns.iter().rev().enumerate() {
            let _ = writeln!(context, "User {}: {}", i + 1, turn.question);
            // Truncate long answers
            let excerpt: String = turn.answer.chars().take(200).collect();
            let ellipsis = if turn.answer.chars().count() > 200 { "..." } else { "" };
            let _ = writeln!(context, "Assistant {}: {excerpt}{ellipsis}", i + 1);
        }
        context
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Plain-text summary of a snapshot and its verdicts, used as chat context
pub fn analysis_context(snapshot: &StockSnapshot, analyses: &[Analysis]) -> String {
    let facts = PromptFacts::from_snapshot(snapshot);
    let mut context = format!(
        "CONTEXT: {} at ${}, 6M trend {}%, P/E {}, debt {}, free cash flow {}, revenue growth {}, beta {}.",
        facts.ticker,
        facts.price,
        facts.trend_6m,
        facts.pe,
        facts.debt,
        facts.free_cashflow,
        facts.revenue_growth,
        facts.beta,
    );
    if facts.partial {
        context.push_str(" Price history was unavailable.");
    }
    if facts.synthetic {
        context.push_str(" Figures are synthetic placeholders, not market data.");
    }

    for analysis in analyses {
        let _ = write!(
            context,
            "\n- {}: {} ({}/100, risk {}) {}",
            analysis.persona.full_name(),
            analysis.verdict,
            analysis.score,
            analysis.risk,
            analysis.thesis,
        );
    }
    context
}

/// Multi-turn follow-up conversation on one ticker
pub struct ChatSession {
    id: Uuid,
    ticker: String,
    provider: Arc<dyn LLMProvider>,
    config: AnalystConfig,
    prompts: Prompts,
    context: String,
    conversation: ConversationManager,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("ticker", &self.ticker)
            .field("turns", &self.conversation.len())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Start a session on the analyst's provider and model
    pub fn new(analyst: &Analyst, snapshot: &StockSnapshot, analyses: &[Analysis]) -> Result<Self> {
        let config = analyst.config().clone();
        let session = Self {
            id: Uuid::new_v4(),
            ticker: snapshot.ticker.to_string(),
            provider: Arc::clone(analyst.provider()),
            conversation: ConversationManager::with_max_history(config.chat_history),
            config,
            prompts: Prompts::new()?,
            context: analysis_context(snapshot, analyses),
        };
        info!(session = %session.id, symbol = %session.ticker, "Chat session started");
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn conversation(&self) -> &ConversationManager {
        &self.conversation
    }

    /// Ask a follow-up question and record the exchange
    #[instrument(skip(self, question), fields(session = %self.id, symbol = %self.ticker))]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnalystError::EmptyQuestion);
        }

        let request = CompletionRequest::builder(&self.config.model)
            .system(self.prompts.chat_system(&self.ticker, &self.context)?)
            .messages(self.conversation.as_messages(self.config.chat_history))
            .add_message(Message::user(question))
            .temperature(self.config.temperature)
            .seed(self.config.seed)
            .max_tokens(self.config.max_tokens)
            .build();
        debug!(messages = request.messages.len(), "Sending follow-up");

        let response = self.provider.complete(request).await?;
        let answer = response.text().trim().to_string();
        if answer.is_empty() {
            return Err(AnalystError::InvalidResponse("empty answer".to_string()));
        }

        self.conversation.add_turn(question.to_string(), answer.clone());
        Ok(answer)
    }

    /// Swap in a refreshed snapshot and verdicts; history is kept
    pub fn reset_context(&mut self, snapshot: &StockSnapshot, analyses: &[Analysis]) {
        self.ticker = snapshot.ticker.to_string();
        self.context = analysis_context(snapshot, analyses);
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::tests::{MockProvider, reply, snapshot};
    use crate::persona::Persona;
    use crate::verdict::{Risk, Verdict};
    use hunter_llm::Role;

    fn analyses() -> Vec<Analysis> {
        vec![
            Analysis {
                persona: Persona::Warren,
                verdict: Verdict::Hold,
                score: 60,
                thesis: "Fairly priced.".to_string(),
                risk: Risk::Low,
                corrected: false,
            },
            Analysis::error(Persona::Jim, "AI error: timeout"),
        ]
    }

    #[test]
    fn test_history_limit() {
        let mut manager = ConversationManager::with_max_history(3);
        for i in 0..5 {
            manager.add_turn(format!("Question {i}"), format!("Answer {i}"));
        }

        assert_eq!(manager.len(), 3);
        assert_eq!(manager.last_turns(1)[0].question, "Question 4");
        assert_eq!(manager.history()[0].question, "Question 2");
    }

    #[test]
    fn test_as_messages_alternates_oldest_first() {
        let mut manager = ConversationManager::new();
        manager.add_turn("q1".to_string(), "a1".to_string());
        manager.add_turn("q2".to_string(), "a2".to_string());
        manager.add_turn("q3".to_string(), "a3".to_string());

        let messages = manager.as_messages(2);
        let texts: Vec<_> = messages.iter().map(Message::text).collect();
        assert_eq!(texts, vec!["q2", "a2", "q3", "a3"]);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_format_recent_context() {
        let mut manager = ConversationManager::new();
        assert!(manager.format_recent_context(5).is_empty());

        manager.add_turn("Is it cheap?".to_string(), "x".repeat(300));
        let context = manager.format_recent_context(5);
        assert!(context.starts_with("Recent conversation:\nUser 1: Is it cheap?"));
        assert!(context.contains(&format!("Assistant 1: {}...", "x".repeat(200))));

        manager.clear();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_analysis_context() {
        let context = analysis_context(&snapshot(), &analyses());

        assert!(context.starts_with("CONTEXT: AAPL at $190.25"));
        assert!(context.contains("P/E 29.50"));
        assert!(context.contains("Price history was unavailable."));
        assert!(context.contains("- Warren Buffett: HOLD (60/100, risk LOW) Fairly priced."));
        assert!(context.contains("ERROR (0/100, risk HIGH) AI error: timeout"));
    }

    #[tokio::test]
    async fn test_ask_replays_history() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|request| {
                request.messages.len() == 1
                    && request
                        .system
                        .as_deref()
                        .is_some_and(|s| s.contains("CONTEXT: AAPL"))
            })
            .times(1)
            .returning(|_| Ok(reply("Around 29x earnings.")));
        provider
            .expect_complete()
            .withf(|request| {
                let texts: Vec<_> = request.messages.iter().map(Message::text).collect();
                texts == ["What is the P/E?", "Around 29x earnings.", "Is that high?"]
            })
            .times(1)
            .returning(|_| Ok(reply("  Above the market average.  ")));

        let analyst = Analyst::new(Arc::new(provider), AnalystConfig::default()).unwrap();
        let mut session = ChatSession::new(&analyst, &snapshot(), &analyses()).unwrap();

        assert_eq!(session.ask("What is the P/E?").await.unwrap(), "Around 29x earnings.");
        assert_eq!(session.ask(" Is that high? ").await.unwrap(), "Above the market average.");
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.ticker(), "AAPL");
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let analyst = Analyst::new(Arc::new(MockProvider::new()), AnalystConfig::default()).unwrap();
        let mut session = ChatSession::new(&analyst, &snapshot(), &[]).unwrap();

        assert!(matches!(session.ask("   ").await, Err(AnalystError::EmptyQuestion)));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_not_recorded() {
        let analyst = Analyst::new(Arc::new(crate::MissingKeyProvider), AnalystConfig::default()).unwrap();
        let mut session = ChatSession::new(&analyst, &snapshot(), &analyses()).unwrap();

        let err = session.ask("Why?").await.unwrap_err();
        assert!(matches!(err, AnalystError::Llm(hunter_llm::LLMError::MissingApiKey)));
        assert!(session.conversation().is_empty());
    }

    #[test]
    fn test_reset_context_keeps_history() {
        let analyst = Analyst::new(Arc::new(crate::MissingKeyProvider), AnalystConfig::default()).unwrap();
        let mut session = ChatSession::new(&analyst, &snapshot(), &[]).unwrap();
        session.conversation.add_turn("q".to_string(), "a".to_string());

        session.reset_context(&snapshot(), &analyses());
        assert!(session.context().contains("Warren Buffett"));
        assert_eq!(session.conversation().len(), 1);

        session.clear_history();
        assert!(session.conversation().is_empty());
    }
}
