//! LLM capability abstraction
//!
//! The engine consumes text completion through the `LlmClient` trait and
//! never sees a vendor SDK. The trait is sync; callers that need async wrap
//! calls in their own blocking executor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "llm")]
pub mod api;

/// Errors from the LLM capability
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM backend unavailable: {0}")]
    Unavailable(String),
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Message role in a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role-tagged message in a completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting, when the provider reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of one completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Abstract text-completion capability
///
/// Sync trait: completions are blocking, potentially long-running calls.
/// The stream driver runs on its own thread, so one run's call never stalls
/// other runs.
pub trait LlmClient: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// One completion over an ordered message sequence
    fn chat(&self, messages: &[ChatMessage], temperature: f32) -> LlmResult<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("hi");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::RequestFailed("timeout".to_string());
        assert!(err.to_string().contains("timeout"));
    }
}
