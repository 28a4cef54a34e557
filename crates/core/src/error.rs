//! Error types for Concierge.
//!
//! The variants follow the failure taxonomy of a conversational turn:
//! classification, query synthesis, evidence adapters, answer synthesis and
//! the turn itself, plus the usual configuration and I/O categories.

use thiserror::Error;

/// Unified error type for Concierge.
///
/// All fallible functions return `Result<T, AppError>`. Components that must
/// never fail outward (router, reflector, orchestrator) recover from these
/// locally instead of propagating them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Route classification could not be obtained
    #[error("Classification error: {0}")]
    Classification(String),

    /// Structured query output could not be produced or understood
    #[error("Query synthesis error: {0}")]
    QuerySynthesis(String),

    /// An evidence source failed (connectivity, unknown collection, bad filter)
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Answer generation failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// A turn could not be completed (timeout, invalid question, panic)
    #[error("Turn error: {0}")]
    Turn(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
