//! Workflow engine: node identifiers, routing and the run driver
//!
//! The graph is static, so it is expressed as a typed state machine: a
//! `NodeId` enum, a pure transition table, and a driver loop that executes
//! one node per step. Conditional routing reads exactly two boolean state
//! fields; a missing value routes like `false`. The first node that sets
//! the error field terminates the run; that is the only interrupt
//! mechanism in the graph.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::llm::LlmClient;
use crate::nodes::{
    CodeExecutor, DataContextLoader, DirectResponder, IntentClassifier, ResponseGenerator,
    TableAnalyzer,
};
use crate::sandbox::SandboxedExecutor;
use crate::session::Session;
use crate::state::{AgentState, DataContext};
use crate::table::TableSource;

/// Identifier of one workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    IntentClassification,
    DataContext,
    TableAnalysis,
    CodeExecution,
    ResponseGeneration,
    DirectResponse,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::IntentClassification => "intent_classification",
            NodeId::DataContext => "data_context",
            NodeId::TableAnalysis => "table_analysis",
            NodeId::CodeExecution => "code_execution",
            NodeId::ResponseGeneration => "response_generation",
            NodeId::DirectResponse => "direct_response",
        }
    }

    /// Terminal nodes end the run after executing
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeId::ResponseGeneration | NodeId::DirectResponse)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry point of the graph
pub const ENTRY_NODE: NodeId = NodeId::IntentClassification;

/// Pure routing decision table.
///
/// Reads only `is_table_related` and `needs_code_execution`; absence is
/// treated as false. Returns `None` after a terminal node.
pub fn next_node(current: NodeId, state: &AgentState) -> Option<NodeId> {
    match current {
        NodeId::IntentClassification => {
            if state.is_table_related.unwrap_or(false) {
                Some(NodeId::DataContext)
            } else {
                Some(NodeId::DirectResponse)
            }
        }
        NodeId::DataContext => Some(NodeId::TableAnalysis),
        NodeId::TableAnalysis => {
            if state.needs_code_execution.unwrap_or(false) {
                Some(NodeId::CodeExecution)
            } else {
                Some(NodeId::ResponseGeneration)
            }
        }
        NodeId::CodeExecution => Some(NodeId::ResponseGeneration),
        NodeId::ResponseGeneration | NodeId::DirectResponse => None,
    }
}

/// One executed step of a run: the node that ran and a snapshot of the
/// state after it
#[derive(Debug, Clone)]
pub struct Step {
    pub node: NodeId,
    pub state: AgentState,
}

/// The workflow engine. Holds every stage node; the shared LLM capability
/// is constructed once and injected into each node that needs it.
pub struct Workflow {
    intent: IntentClassifier,
    data_context: DataContextLoader,
    analysis: TableAnalyzer,
    execution: CodeExecutor,
    response: ResponseGenerator,
    direct: DirectResponder,
}

impl Workflow {
    pub fn new(
        config: &AgentConfig,
        llm: Option<Arc<dyn LlmClient>>,
        source: Arc<dyn TableSource>,
    ) -> Self {
        Self {
            intent: IntentClassifier::new(llm.clone(), config.table_keywords.clone()),
            data_context: DataContextLoader::new(source, config.max_preview_rows),
            analysis: TableAnalyzer::new(llm.clone()),
            execution: CodeExecutor::new(SandboxedExecutor::with_timeout(config.code_timeout)),
            response: ResponseGenerator::new(),
            direct: DirectResponder::new(llm),
        }
    }

    /// Start a run: a lazy, finite, non-restartable sequence of steps.
    /// The iterator stops after a terminal node or after the first node
    /// that records an error.
    pub fn run(&self, initial_state: AgentState) -> WorkflowRun<'_> {
        WorkflowRun {
            workflow: self,
            state: initial_state,
            next: Some(ENTRY_NODE),
        }
    }

    /// Drive a run to completion and return the final state
    pub fn invoke(&self, initial_state: AgentState) -> AgentState {
        let mut run = self.run(initial_state);
        let mut last = None;
        for step in &mut run {
            last = Some(step.state);
        }
        last.unwrap_or_default()
    }

    /// Run only the data-context stage for a session's file, for summary
    /// endpoints that want metadata without a chat turn
    pub fn data_summary(&self, session: &Session) -> Result<DataContext, String> {
        let mut state = AgentState::new("", session.file_info.clone());
        self.data_context.run(&mut state);
        if let Some(error) = state.error {
            return Err(error);
        }
        state.data_context.ok_or_else(|| "No data context produced".to_string())
    }

    fn execute_node(&self, node: NodeId, state: &mut AgentState) {
        tracing::debug!(node = %node, "executing node");
        match node {
            NodeId::IntentClassification => self.intent.run(state),
            NodeId::DataContext => self.data_context.run(state),
            NodeId::TableAnalysis => self.analysis.run(state),
            NodeId::CodeExecution => self.execution.run(state),
            NodeId::ResponseGeneration => self.response.run(state),
            NodeId::DirectResponse => self.direct.run(state),
        }
    }
}

/// An in-progress run. Owns the state; cannot be restarted.
pub struct WorkflowRun<'w> {
    workflow: &'w Workflow,
    state: AgentState,
    next: Option<NodeId>,
}

impl WorkflowRun<'_> {
    /// Consume the run and return whatever state it reached
    pub fn into_state(self) -> AgentState {
        self.state
    }
}

impl Iterator for WorkflowRun<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let node = self.next.take()?;
        self.workflow.execute_node(node, &mut self.state);
        let snapshot = self.state.clone();

        if snapshot.error.is_none() {
            self.next = next_node(node, &snapshot);
        }

        Some(Step {
            node,
            state: snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ChatResponse, LlmResult};
    use crate::session::{FileInfo, MemorySessionStore, SessionStore};
    use crate::table::{DataFrame, StaticTableSource};

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

    fn table_source() -> Arc<dyn TableSource> {
        let df = DataFrame::from_records(
            vec!["x".into()],
            vec![vec!["1".into()], vec!["2".into()]],
        );
        Arc::new(StaticTableSource::new(df))
    }

    fn file_info() -> Option<FileInfo> {
        Some(FileInfo::new("t.csv", "/tmp/t.csv"))
    }

    #[test]
    fn test_routing_table_related() {
        let mut state = AgentState::new("q", None);
        state.is_table_related = Some(true);
        assert_eq!(
            next_node(NodeId::IntentClassification, &state),
            Some(NodeId::DataContext)
        );
    }

    #[test]
    fn test_routing_missing_flag_is_false() {
        let state = AgentState::new("q", None);
        assert_eq!(
            next_node(NodeId::IntentClassification, &state),
            Some(NodeId::DirectResponse)
        );
        assert_eq!(
            next_node(NodeId::TableAnalysis, &state),
            Some(NodeId::ResponseGeneration)
        );
    }

    #[test]
    fn test_routing_code_execution_branch() {
        let mut state = AgentState::new("q", None);
        state.needs_code_execution = Some(true);
        assert_eq!(
            next_node(NodeId::TableAnalysis, &state),
            Some(NodeId::CodeExecution)
        );
        assert_eq!(
            next_node(NodeId::CodeExecution, &state),
            Some(NodeId::ResponseGeneration)
        );
    }

    #[test]
    fn test_terminal_nodes_end_the_run() {
        let state = AgentState::new("q", None);
        assert_eq!(next_node(NodeId::ResponseGeneration, &state), None);
        assert_eq!(next_node(NodeId::DirectResponse, &state), None);
        assert!(NodeId::ResponseGeneration.is_terminal());
        assert!(NodeId::DirectResponse.is_terminal());
        assert!(!NodeId::CodeExecution.is_terminal());
    }

    #[test]
    fn test_full_table_run_node_sequence() {
        let reply = "Mean:\n```lua\nprint(stats.mean(stats.col(df, 'x')))\n```";
        let workflow = Workflow::new(
            &AgentConfig::default(),
            Some(Arc::new(ScriptedLlm(reply.into()))),
            table_source(),
        );

        let steps: Vec<NodeId> = workflow
            .run(AgentState::new("average of column x?", file_info()))
            .map(|s| s.node)
            .collect();

        assert_eq!(
            steps,
            vec![
                NodeId::IntentClassification,
                NodeId::DataContext,
                NodeId::TableAnalysis,
                NodeId::CodeExecution,
                NodeId::ResponseGeneration,
            ]
        );
    }

    #[test]
    fn test_direct_run_node_sequence() {
        let workflow = Workflow::new(&AgentConfig::default(), None, table_source());
        let steps: Vec<NodeId> = workflow
            .run(AgentState::new("Tell me a joke", file_info()))
            .map(|s| s.node)
            .collect();
        assert_eq!(
            steps,
            vec![NodeId::IntentClassification, NodeId::DirectResponse]
        );
    }

    #[test]
    fn test_error_short_circuits() {
        // Table-related message but no file info: data context must fail
        let workflow = Workflow::new(&AgentConfig::default(), None, table_source());
        let steps: Vec<Step> = workflow
            .run(AgentState::new("show me the data", None))
            .collect();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].node, NodeId::IntentClassification);
        assert_eq!(steps[1].node, NodeId::DataContext);
        assert!(steps[1].state.error.is_some());
    }

    #[test]
    fn test_invoke_returns_final_state() {
        let workflow = Workflow::new(&AgentConfig::default(), None, table_source());
        let final_state = workflow.invoke(AgentState::new("Tell me a joke", file_info()));
        assert!(final_state.final_response.is_some());
    }

    #[test]
    fn test_data_summary() {
        let workflow = Workflow::new(&AgentConfig::default(), None, table_source());
        let mut session = MemorySessionStore::new().create();
        session.file_info = file_info();
        let context = workflow.data_summary(&session).unwrap();
        assert_eq!(context.total_rows, 2);

        session.file_info = None;
        assert!(workflow.data_summary(&session).is_err());
    }
}
