//! Per-run workflow state
//!
//! One `AgentState` is created per run and threaded through every node.
//! Each key of the original dynamic record is an explicitly named field so
//! the compiler covers every read and write; nodes write only the fields
//! they own. A set `error` field short-circuits the rest of the run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::session::FileInfo;
use crate::table::DataFrame;

/// Outcome of running one extracted code block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExecutionResult {
    /// The exact extracted snippet
    pub code: String,
    /// Captured output, or the failure message
    pub output: String,
    pub success: bool,
}

/// Structured metadata about the loaded table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataContext {
    pub filename: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub dtypes: Vec<String>,
    /// First rows as JSON records
    pub preview_records: Vec<JsonValue>,
    /// Fixed-width text rendering of header plus first rows
    pub preview_string: String,
}

/// The per-run state record
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Immutable for the run
    pub user_message: String,
    pub file_info: Option<FileInfo>,
    pub session_id: Option<Uuid>,

    /// Written by the intent classifier
    pub is_table_related: Option<bool>,

    /// Written by the data context loader
    pub data_context: Option<DataContext>,
    pub dataframe: Option<Arc<DataFrame>>,

    /// Written by the table analyzer; set together
    pub analysis_response: Option<String>,
    pub needs_code_execution: Option<bool>,
    pub code_to_execute: Vec<String>,

    /// Written by the code executor, one entry per block in order
    pub code_execution_results: Vec<CodeExecutionResult>,

    /// Written by a terminal node
    pub final_response: Option<String>,

    /// Set by any node; presence halts the run
    pub error: Option<String>,
}

impl AgentState {
    pub fn new(user_message: impl Into<String>, file_info: Option<FileInfo>) -> Self {
        Self {
            user_message: user_message.into(),
            file_info,
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Record a fatal condition; the engine stops after the current node
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_has_only_inputs() {
        let state = AgentState::new("hello", None);
        assert_eq!(state.user_message, "hello");
        assert!(state.is_table_related.is_none());
        assert!(state.error.is_none());
        assert!(state.code_to_execute.is_empty());
    }

    #[test]
    fn test_fail_sets_error() {
        let mut state = AgentState::new("x", None);
        state.fail("boom");
        assert_eq!(state.error.as_deref(), Some("boom"));
    }
}
