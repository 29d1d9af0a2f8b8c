//! Streaming transport: events, chunking and the run driver
//!
//! A chat turn is delivered as a sequence of typed events over a bounded
//! channel: thinking markers while nodes run, response fragments once the
//! final text exists, then exactly one terminal event (`Done` on success,
//! `Error` otherwise, never both). The driver runs the workflow on its own
//! thread and stops early when the consumer cancels or drops the receiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::engine::{NodeId, Workflow};
use crate::error::{FlowError, FlowResult};
use crate::llm::Role;
use crate::session::{FileInfo, Session, SessionStore};
use crate::state::AgentState;

/// One event on the chat stream. Serializes as `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking { content: String },
    Response { content: String },
    Error { content: String },
    Done,
}

/// First thinking marker, sent before any node runs
pub const INITIAL_THINKING: &str = "Analyzing your question...\n";

/// Progress marker shown after a stage completes
pub fn thinking_label(node: NodeId) -> &'static str {
    match node {
        NodeId::IntentClassification => "Determining the question type...\n",
        NodeId::DataContext => "Table analysis requested, loading data...\n",
        NodeId::TableAnalysis => "Analyzing the data and drafting an answer...\n",
        NodeId::CodeExecution => "Running the analysis code...\n",
        NodeId::ResponseGeneration => "Assembling the results...\n",
        NodeId::DirectResponse => "Writing a reply...\n",
    }
}

/// Split a response into word-aligned chunks of at most `budget` characters.
///
/// Greedy word accumulation: the candidate length is checked before a word
/// is appended, so chunks stay within the budget except for a single word
/// longer than the budget, which becomes its own chunk. Whitespace is
/// normalized to single spaces and every chunk keeps a trailing space, so
/// concatenating the fragments reconstructs the normalized text.
pub fn split_response(text: &str, budget: usize) -> Vec<String> {
    if text.chars().count() <= budget {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count() + 1;
        if current_len > 0 && current_len + word_len > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(word);
        current.push(' ');
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Consumer-side cancellation flag for an in-flight stream
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run the workflow on a background thread and stream its events.
///
/// The channel is bounded at `config.queue_capacity`; a slow consumer
/// applies backpressure to the driver. Dropping the receiver or firing
/// the cancel handle stops the driver at the next event boundary.
pub fn stream_run(
    workflow: Arc<Workflow>,
    state: AgentState,
    config: &AgentConfig,
) -> (Receiver<StreamEvent>, CancelHandle) {
    let (tx, rx) = bounded(config.queue_capacity.max(1));
    let cancel = CancelHandle::new();
    let flag = cancel.clone();
    let chunk_size = config.chunk_size;
    let chunk_delay = config.chunk_delay;

    thread::spawn(move || {
        drive(workflow, state, tx, flag, chunk_size, chunk_delay);
    });

    (rx, cancel)
}

fn drive(
    workflow: Arc<Workflow>,
    state: AgentState,
    tx: Sender<StreamEvent>,
    cancel: CancelHandle,
    chunk_size: usize,
    chunk_delay: Duration,
) {
    let send = |event: StreamEvent| -> bool {
        if cancel.is_cancelled() {
            tracing::debug!("stream cancelled");
            return false;
        }
        tx.send(event).is_ok()
    };

    if !send(StreamEvent::Thinking {
        content: INITIAL_THINKING.to_string(),
    }) {
        return;
    }

    let mut final_state = None;
    for step in workflow.run(state) {
        // A failed node contributes no thinking marker, only the error
        if let Some(error) = &step.state.error {
            tracing::warn!(node = %step.node, "run failed: {}", error);
            send(StreamEvent::Error {
                content: error.clone(),
            });
            return;
        }
        if !send(StreamEvent::Thinking {
            content: thinking_label(step.node).to_string(),
        }) {
            return;
        }
        final_state = Some(step.state);
    }

    let response = final_state
        .and_then(|s| s.final_response)
        .unwrap_or_default();

    for chunk in split_response(&response, chunk_size) {
        if !send(StreamEvent::Response { content: chunk }) {
            return;
        }
        if !chunk_delay.is_zero() {
            thread::sleep(chunk_delay);
        }
    }

    send(StreamEvent::Done);
}

/// Session-aware chat facade: owns the workflow, the session store and the
/// streaming config, and persists assistant output as it streams.
pub struct ChatService {
    workflow: Arc<Workflow>,
    store: Arc<dyn SessionStore>,
    config: AgentConfig,
}

impl ChatService {
    pub fn new(workflow: Arc<Workflow>, store: Arc<dyn SessionStore>, config: AgentConfig) -> Self {
        Self {
            workflow,
            store,
            config,
        }
    }

    pub fn create_session(&self) -> Session {
        self.store.create()
    }

    pub fn attach_file(&self, session_id: Uuid, file_info: FileInfo) -> FlowResult<()> {
        self.store.set_file_info(session_id, file_info)
    }

    /// Start a streamed chat turn. The user message and an empty assistant
    /// message are persisted up front; response fragments are appended to
    /// the assistant message as they pass through the returned stream.
    pub fn chat(&self, session_id: Uuid, message: &str) -> FlowResult<ChatStream> {
        let session = self
            .store
            .get(session_id)
            .ok_or(FlowError::SessionNotFound(session_id))?;

        self.store.append_message(session_id, Role::User, message)?;
        self.store.append_message(session_id, Role::Assistant, "")?;

        let state = AgentState::new(message, session.file_info).with_session(session_id);
        let (rx, cancel) = stream_run(self.workflow.clone(), state, &self.config);

        Ok(ChatStream {
            rx,
            cancel,
            store: self.store.clone(),
            session_id,
        })
    }
}

/// An in-flight chat turn. Iterating yields each event once; response and
/// thinking fragments are written through to the session transcript on the
/// way out.
pub struct ChatStream {
    rx: Receiver<StreamEvent>,
    cancel: CancelHandle,
    store: Arc<dyn SessionStore>,
    session_id: Uuid,
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl ChatStream {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Iterator for ChatStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().ok()?;
        let persisted = match &event {
            StreamEvent::Response { content } => {
                self.store.update_last_message(self.session_id, content)
            }
            StreamEvent::Thinking { content } => {
                self.store.update_last_thinking(self.session_id, content)
            }
            _ => Ok(()),
        };
        if let Err(e) = persisted {
            tracing::warn!("failed to persist stream fragment: {}", e);
        }
        Some(event)
    }
}
