//! Error types for analysis operations

use hunter_llm::LLMError;
use thiserror::Error;

/// Analysis specific errors
#[derive(Debug, Error)]
pub enum AnalystError {
    /// The completion endpoint failed
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// A prompt template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Persona name not recognised
    #[error("Unknown persona: {0} (expected warren, cathie or jim)")]
    UnknownPersona(String),

    /// The model reply could not be turned into a verdict
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// Blank chat question
    #[error("Question is empty")]
    EmptyQuestion,

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalystError>;
