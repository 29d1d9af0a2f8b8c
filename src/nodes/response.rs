//! Terminal response nodes

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient};
use crate::state::AgentState;

/// Fallback reply when the direct path has no usable LLM
pub const DIRECT_RESPONSE_FALLBACK: &str = "Sorry, no language model is configured, \
so this question cannot be answered. Set the OPENAI_API_KEY environment variable \
to enable assistant replies.";

const DIRECT_SYSTEM_PROMPT: &str = "You are a friendly, professional assistant. \
The user's question is not about tabular data analysis; answer it directly in a \
warm, professional tone.";

/// Composes the final table-path response: the analysis text plus a
/// deterministic appendix with every execution result. No LLM call.
pub struct ResponseGenerator;

impl ResponseGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, state: &mut AgentState) {
        let mut response = state.analysis_response.clone().unwrap_or_default();

        if !state.code_execution_results.is_empty() {
            tracing::debug!(
                results = state.code_execution_results.len(),
                "appending execution results"
            );
            response.push_str("\n\n## Code execution results\n\n");
            for (i, result) in state.code_execution_results.iter().enumerate() {
                response.push_str(&format!("### Block {}\n", i + 1));
                response.push_str(&format!("```lua\n{}\n```\n\n", result.code));
                let label = if result.success { "Output" } else { "Error" };
                response.push_str(&format!("**{}:**\n```\n{}\n```\n\n", label, result.output));
            }
        }

        state.final_response = Some(response);
    }
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Answers non-table questions with one friendly completion; substitutes a
/// fixed fallback when the LLM is absent or the call fails. Terminal.
pub struct DirectResponder {
    llm: Option<Arc<dyn LlmClient>>,
}

impl DirectResponder {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn run(&self, state: &mut AgentState) {
        let Some(llm) = &self.llm else {
            tracing::warn!("no LLM configured for direct response");
            state.final_response = Some(DIRECT_RESPONSE_FALLBACK.to_string());
            return;
        };

        let messages = [
            ChatMessage::system(DIRECT_SYSTEM_PROMPT),
            ChatMessage::user(state.user_message.clone()),
        ];

        match llm.chat(&messages, 0.7) {
            Ok(response) => {
                tracing::info!(response_len = response.content.len(), "direct response generated");
                state.final_response = Some(response.content);
            }
            Err(e) => {
                tracing::warn!("direct response LLM call failed: {}", e);
                state.final_response = Some(DIRECT_RESPONSE_FALLBACK.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, LlmError, LlmResult};
    use crate::state::CodeExecutionResult;

    struct ScriptedLlm(String);

    impl LlmClient for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }
        fn chat(&self, _: &[ChatMessage], _: f32) -> LlmResult<ChatResponse> {
            Ok(ChatResponse {
                content: self.0.clone(),
                usage: None,
            })
        }
    }

    struct FailingLlm;

    impl LlmClient for FailingLlm {
        fn name(&self) -> &str {
            "failing"
        }
        fn chat(&self, _: &[ChatMessage], _: f32) -> LlmResult<ChatResponse> {
            Err(LlmError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_generator_without_results_passes_analysis_through() {
        let mut state = AgentState::new("q", None);
        state.analysis_response = Some("The answer is 42.".to_string());
        ResponseGenerator::new().run(&mut state);
        assert_eq!(state.final_response.as_deref(), Some("The answer is 42."));
    }

    #[test]
    fn test_generator_appends_numbered_results() {
        let mut state = AgentState::new("q", None);
        state.analysis_response = Some("Computing.".to_string());
        state.code_execution_results = vec![
            CodeExecutionResult {
                code: "print(1)".into(),
                output: "1\n".into(),
                success: true,
            },
            CodeExecutionResult {
                code: "error('x')".into(),
                output: "Execution error: x".into(),
                success: false,
            },
        ];
        ResponseGenerator::new().run(&mut state);

        let out = state.final_response.unwrap();
        assert!(out.starts_with("Computing."));
        assert!(out.contains("### Block 1"));
        assert!(out.contains("### Block 2"));
        assert!(out.contains("**Output:**"));
        assert!(out.contains("**Error:**"));
        assert!(out.find("Block 1").unwrap() < out.find("Block 2").unwrap());
    }

    #[test]
    fn test_direct_responder_uses_llm() {
        let node = DirectResponder::new(Some(Arc::new(ScriptedLlm("Here's a joke.".into()))));
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        assert_eq!(state.final_response.as_deref(), Some("Here's a joke."));
    }

    #[test]
    fn test_direct_responder_fallback_without_llm() {
        let node = DirectResponder::new(None);
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        assert_eq!(state.final_response.as_deref(), Some(DIRECT_RESPONSE_FALLBACK));
    }

    #[test]
    fn test_direct_responder_fallback_on_failure() {
        let node = DirectResponder::new(Some(Arc::new(FailingLlm)));
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        assert_eq!(state.final_response.as_deref(), Some(DIRECT_RESPONSE_FALLBACK));
        assert!(state.error.is_none());
    }
}
