//! Configuration for analysis runs

use crate::error::{AnalystError, Result};
use crate::persona::Persona;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Model parameters and persona selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Chat-completion model identifier
    pub model: String,

    /// Sampling temperature; 0 for repeatable verdicts
    pub temperature: f32,

    /// Sampling seed
    pub seed: u64,

    /// Reply budget per call
    pub max_tokens: usize,

    /// Personas consulted by `analyze_all`, in display order
    pub personas: Vec<Persona>,

    /// Chat turns replayed with every follow-up question
    pub chat_history: usize,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            seed: 42,
            max_tokens: 512,
            personas: Persona::all(),
            chat_history: 20,
        }
    }
}

impl AnalystConfig {
    /// Defaults, with the model taken from `OPENAI_MODEL` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(model) = std::env::var("OPENAI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
        {
            config.model = model;
        }
        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Restrict to the given personas; duplicates are dropped, order kept
    pub fn with_personas(mut self, personas: impl IntoIterator<Item = Persona>) -> Self {
        let mut selected = Vec::new();
        for persona in personas {
            if !selected.contains(&persona) {
                selected.push(persona);
            }
        }
        self.personas = selected;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AnalystError::Config("model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AnalystError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }

        if self.personas.is_empty() {
            return Err(AnalystError::Config("at least one persona is required".to_string()));
        }

        if self.max_tokens == 0 {
            return Err(AnalystError::Config("max_tokens must be greater than 0".to_string()));
        }

        Ok(())
    }
}
