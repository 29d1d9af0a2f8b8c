//! Intent classification node

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient};
use crate::state::AgentState;

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are an intent classification expert. Decide whether the user's question \
is about analyzing tabular data.

Table-related questions include, among others:
- statistics and aggregation over data
- querying or filtering rows
- data visualization
- questions about columns or fields
- computations, summaries and trend analysis

Answer with exactly \"yes\" or \"no\".";

/// Decides whether the message needs the table-analysis path.
///
/// Fast path: case-insensitive keyword match against a fixed multilingual
/// list, which skips the LLM entirely. Otherwise one yes/no completion.
/// A failed LLM call fails open to table-related: a false negative silently
/// drops the analysis, a false positive only costs one harmless extra
/// round. With no LLM configured the keyword verdict stands.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmClient>>,
    keywords: Vec<String>,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, keywords: Vec<String>) -> Self {
        Self { llm, keywords }
    }

    pub fn run(&self, state: &mut AgentState) {
        tracing::debug!("classifying intent");
        let message = state.user_message.to_lowercase();

        let mut is_table_related = self
            .keywords
            .iter()
            .any(|keyword| message.contains(&keyword.to_lowercase()));

        if is_table_related {
            tracing::debug!("keyword match, skipping LLM classification");
        } else if let Some(llm) = &self.llm {
            let messages = [
                ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
                ChatMessage::user(format!("User question: {}", state.user_message)),
            ];
            match llm.chat(&messages, 0.0) {
                Ok(response) => {
                    let reply = response.content.to_lowercase();
                    is_table_related = reply.contains("yes") || reply.contains("是");
                    tracing::debug!(reply = %response.content, is_table_related, "LLM classification");
                }
                Err(e) => {
                    // Fail open: the table path degrades gracefully, the
                    // direct path would silently drop the analysis
                    tracing::warn!("intent classification LLM call failed, defaulting to table-related: {}", e);
                    is_table_related = true;
                }
            }
        }

        tracing::info!(is_table_related, "intent classified");
        state.is_table_related = Some(is_table_related);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::llm::{ChatResponse, LlmError, LlmResult};

    struct FailingLlm;

    impl LlmClient for FailingLlm {
        fn name(&self) -> &str {
            "failing"
        }
        fn chat(&self, _: &[ChatMessage], _: f32) -> LlmResult<ChatResponse> {
            Err(LlmError::RequestFailed("down".to_string()))
        }
    }

    struct NoLlm;

    impl LlmClient for NoLlm {
        fn name(&self) -> &str {
            "no"
        }
        fn chat(&self, _: &[ChatMessage], _: f32) -> LlmResult<ChatResponse> {
            Ok(ChatResponse {
                content: "no".to_string(),
                usage: None,
            })
        }
    }

    fn keywords() -> Vec<String> {
        AgentConfig::default().table_keywords
    }

    #[test]
    fn test_keyword_match_skips_llm() {
        // FailingLlm would flip the default if it were consulted
        let node = IntentClassifier::new(Some(Arc::new(FailingLlm)), keywords());
        let mut state = AgentState::new("What is the average of column X?", None);
        node.run(&mut state);
        assert_eq!(state.is_table_related, Some(true));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let node = IntentClassifier::new(None, keywords());
        let mut state = AgentState::new("Show me some STATISTICS please", None);
        node.run(&mut state);
        assert_eq!(state.is_table_related, Some(true));
    }

    #[test]
    fn test_no_keyword_no_llm_keeps_keyword_verdict() {
        let node = IntentClassifier::new(None, keywords());
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        // No keyword and no LLM leaves the keyword verdict standing
        assert_eq!(state.is_table_related, Some(false));
    }

    #[test]
    fn test_llm_failure_defaults_to_table_related() {
        let node = IntentClassifier::new(Some(Arc::new(FailingLlm)), keywords());
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        assert_eq!(state.is_table_related, Some(true));
    }

    #[test]
    fn test_llm_negative_verdict() {
        let node = IntentClassifier::new(Some(Arc::new(NoLlm)), keywords());
        let mut state = AgentState::new("Tell me a joke", None);
        node.run(&mut state);
        assert_eq!(state.is_table_related, Some(false));
    }
}
