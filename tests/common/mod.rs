//! Shared helpers for integration tests

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use tableflow::{ChatMessage, ChatResponse, FileInfo, LlmClient, LlmError, LlmResult};

/// LLM stub that replays a fixed queue of replies in call order
pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
}

impl MockLlm {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
        })
    }
}

impl LlmClient for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> LlmResult<ChatResponse> {
        let reply = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable("mock reply queue exhausted".to_string()))?;
        Ok(ChatResponse {
            content: reply,
            usage: None,
        })
    }
}

/// LLM stub whose every call fails
pub struct FailingLlm;

impl LlmClient for FailingLlm {
    fn name(&self) -> &str {
        "failing"
    }

    fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> LlmResult<ChatResponse> {
        Err(LlmError::RequestFailed("connection refused".to_string()))
    }
}

/// Write a CSV with columns `id,value` where value = id, for `rows` rows.
/// Returns the temp file (keep it alive) and the matching file reference.
pub fn numeric_csv(rows: usize) -> (NamedTempFile, FileInfo) {
    let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(tmp, "id,value").unwrap();
    for i in 0..rows {
        writeln!(tmp, "{},{}", i, i).unwrap();
    }
    tmp.flush().unwrap();
    let info = FileInfo::new("numbers.csv", tmp.path());
    (tmp, info)
}
