//! Error types for tableflow

use thiserror::Error;

use crate::llm::LlmError;

/// Main error type for tableflow
#[derive(Error, Debug)]
pub enum FlowError {
    // Data access errors (fatal to a run)
    #[error("Data access error: {0}")]
    DataAccess(String),

    // Sandbox infrastructure errors (distinct from per-block failures,
    // which are recorded as CodeExecutionResult and never raised)
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    // Session store errors
    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Session has no messages to update")]
    EmptySession,

    // LLM errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // CSV errors
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for tableflow
pub type FlowResult<T> = Result<T, FlowError>;

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

impl From<mlua::Error> for FlowError {
    fn from(err: mlua::Error) -> Self {
        FlowError::Sandbox(err.to_string())
    }
}
