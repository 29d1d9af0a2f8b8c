//! Code execution node

use crate::sandbox::SandboxedExecutor;
use crate::state::AgentState;

/// Runs every extracted block through the sandboxed executor. Per-block
/// failures are data, not run-fatal: this node never sets the error field,
/// and an empty block list is a pass-through.
pub struct CodeExecutor {
    sandbox: SandboxedExecutor,
}

impl CodeExecutor {
    pub fn new(sandbox: SandboxedExecutor) -> Self {
        Self { sandbox }
    }

    pub fn run(&self, state: &mut AgentState) {
        if state.code_to_execute.is_empty() {
            tracing::debug!("no code blocks to execute");
            return;
        }

        let Some(df) = state.dataframe.clone() else {
            // Unreachable through normal routing; record failures per block
            // rather than aborting the run
            tracing::warn!("code blocks present but no table is loaded");
            state.code_execution_results = state
                .code_to_execute
                .iter()
                .map(|code| crate::state::CodeExecutionResult {
                    code: code.clone(),
                    output: "Execution error: no table is loaded".to_string(),
                    success: false,
                })
                .collect();
            return;
        };

        tracing::info!(blocks = state.code_to_execute.len(), "executing code blocks");
        let results = self.sandbox.execute_all(&state.code_to_execute, &df);
        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(succeeded, total = results.len(), "code execution finished");
        state.code_execution_results = results;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::table::DataFrame;

    fn frame() -> DataFrame {
        DataFrame::from_records(
            vec!["x".into()],
            vec![vec!["1".into()], vec!["2".into()], vec!["3".into()]],
        )
    }

    #[test]
    fn test_empty_blocks_is_noop() {
        let node = CodeExecutor::new(SandboxedExecutor::new());
        let mut state = AgentState::new("q", None);
        state.dataframe = Some(Arc::new(frame()));
        node.run(&mut state);
        assert!(state.code_execution_results.is_empty());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_results_match_block_order() {
        let node = CodeExecutor::new(SandboxedExecutor::new());
        let mut state = AgentState::new("q", None);
        state.dataframe = Some(Arc::new(frame()));
        state.code_to_execute = vec![
            "print(stats.sum(stats.col(df, 'x')))".to_string(),
            "error('nope')".to_string(),
        ];
        node.run(&mut state);

        assert_eq!(state.code_execution_results.len(), 2);
        assert!(state.code_execution_results[0].success);
        assert_eq!(state.code_execution_results[0].output.trim(), "6");
        assert!(!state.code_execution_results[1].success);
        // Failures never escalate to the run level
        assert!(state.error.is_none());
    }

    #[test]
    fn test_missing_dataframe_records_failures() {
        let node = CodeExecutor::new(SandboxedExecutor::new());
        let mut state = AgentState::new("q", None);
        state.code_to_execute = vec!["print(1)".to_string()];
        node.run(&mut state);

        assert_eq!(state.code_execution_results.len(), 1);
        assert!(!state.code_execution_results[0].success);
        assert!(state.error.is_none());
    }
}
