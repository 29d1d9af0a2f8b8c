//! tableflow - Table Analysis Chat Workflow Engine
//!
//! A typed workflow engine for chat-driven analysis of tabular data. One
//! chat turn flows through a fixed graph: intent classification routes
//! table questions into data loading, LLM analysis, sandboxed Lua code
//! execution and response assembly, while everything else gets a direct
//! conversational reply. Progress and output are delivered as a stream of
//! typed events over a bounded channel.
//!
//! # Features
//!
//! - Typed agent state and a pure, enum-based transition table
//! - Keyword fast path plus LLM fallback for intent classification
//! - CSV/TSV loading with per-column dtype inference
//! - Sandboxed Lua execution with a denylist, stripped globals and a hard
//!   wall-clock timeout
//! - Word-aligned response chunking with backpressure and cancellation
//! - Session store with streamed-fragment persistence
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tableflow::{AgentConfig, AgentState, CsvTableSource, FileInfo, Workflow};
//!
//! let config = AgentConfig::from_env();
//! let workflow = Workflow::new(&config, None, Arc::new(CsvTableSource::new()));
//!
//! let file = FileInfo::new("sales.csv", "/data/sales.csv");
//! let state = AgentState::new("What is the average amount?", Some(file));
//! let final_state = workflow.invoke(state);
//! println!("{}", final_state.final_response.unwrap_or_default());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod nodes;
pub mod sandbox;
pub mod session;
pub mod state;
pub mod stream;
pub mod table;

// Re-exports
pub use config::{AgentConfig, TABLE_RELATED_KEYWORDS};
pub use engine::{next_node, NodeId, Step, Workflow, WorkflowRun, ENTRY_NODE};
pub use error::{FlowError, FlowResult};
pub use llm::{ChatMessage, ChatResponse, LlmClient, LlmError, LlmResult, Role};
pub use nodes::{extract_code_blocks, DIRECT_RESPONSE_FALLBACK};
pub use sandbox::SandboxedExecutor;
pub use session::{FileInfo, MemorySessionStore, Session, SessionMessage, SessionStore};
pub use state::{AgentState, CodeExecutionResult, DataContext};
pub use stream::{stream_run, CancelHandle, ChatService, ChatStream, StreamEvent};
pub use table::{Cell, CsvTableSource, DType, DataFrame, StaticTableSource, TableSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentConfig, AgentState, CancelHandle, ChatService, CsvTableSource, DataFrame, FileInfo,
        FlowError, FlowResult, LlmClient, MemorySessionStore, NodeId, Session, SessionStore,
        StreamEvent, Workflow,
    };
}
