//! OpenAI-compatible chat completion client
//!
//! Works against api.openai.com or any endpoint speaking the same wire
//! format (Ollama, vLLM, LM Studio).

use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, LlmResult, Usage};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Client configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl OpenAiConfig {
    /// Resolve from the environment: `TABLEFLOW_API_BASE`, `OPENAI_API_KEY`,
    /// `TABLEFLOW_MODEL`. Returns `None` when no key is set and the base is
    /// still the OpenAI default (which would only yield 401s).
    pub fn from_env() -> Option<Self> {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("TABLEFLOW_API_BASE") {
            config.api_base = base;
        }
        if let Ok(model) = std::env::var("TABLEFLOW_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("OPENAI_API_KEY").ok();

        if config.api_key.is_none() && config.api_base == DEFAULT_API_BASE {
            tracing::warn!("OPENAI_API_KEY not set; LLM capability disabled");
            return None;
        }
        Some(config)
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Blocking OpenAI-compatible client
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            config,
        }
    }

    /// Client from environment variables, or `None` when unconfigured
    pub fn from_env() -> Option<Self> {
        OpenAiConfig::from_env().map(Self::new)
    }
}

impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn chat(&self, messages: &[ChatMessage], temperature: f32) -> LlmResult<ChatResponse> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature,
        };

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("{}: {}", status, body)));
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("empty choices array".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest {
            model: "test-model",
            messages: vec![WireMessage {
                role: "user",
                content: "hello",
            }],
            temperature: 0.1,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"test-model\""));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "42"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "42");
        assert_eq!(parsed.usage.as_ref().unwrap().total_tokens, 11);
    }
}
