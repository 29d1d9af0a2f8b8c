//! Table analysis node and code-fence extraction

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient};
use crate::state::AgentState;

const CODE_FENCE_OPEN: &str = "```lua";
const CODE_FENCE_CLOSE: &str = "```";

/// Asks the model to answer the question over the loaded table, emitting
/// fenced Lua blocks when computation is needed. Without an LLM it degrades
/// to an overview built from the data context and never requests code
/// execution. An LLM failure here is fatal: analysis cannot be faked.
pub struct TableAnalyzer {
    llm: Option<Arc<dyn LlmClient>>,
}

impl TableAnalyzer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn run(&self, state: &mut AgentState) {
        let Some(context) = state.data_context.clone() else {
            tracing::error!("data context not ready");
            state.fail("Data context is not ready");
            return;
        };

        let Some(llm) = &self.llm else {
            tracing::warn!("no LLM configured, falling back to overview-only analysis");
            state.analysis_response = Some(overview_response(&context));
            state.needs_code_execution = Some(false);
            state.code_to_execute = Vec::new();
            return;
        };

        let system_prompt = format!(
            "You are a professional data analyst. The user uploaded a data file; \
answer their question about it.

Data file:
- filename: {filename}
- total rows: {rows}
- total columns: {cols}
- columns: {columns}

Preview (first rows):
{preview}

Answer the question directly when the preview suffices. When a computation \
over the full table is required, include one or more Lua code blocks. The \
full table is pre-bound as `df`, an array of row records keyed by column \
name; `columns` holds the column names. Helpers: `stats.col(df, name)` \
extracts a column as an array, and `stats.sum`, `stats.mean`, `stats.min`, \
`stats.max`, `stats.count` aggregate an array. Use `print(...)` for every \
result you want reported. Format code blocks as:
```lua
-- your code
```",
            filename = context.filename,
            rows = context.total_rows,
            cols = context.total_columns,
            columns = context.columns.join(", "),
            preview = context.preview_string,
        );

        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(state.user_message.clone()),
        ];

        match llm.chat(&messages, 0.1) {
            Ok(response) => {
                let blocks = extract_code_blocks(&response.content);
                tracing::info!(
                    response_len = response.content.len(),
                    code_blocks = blocks.len(),
                    "table analysis complete"
                );
                state.analysis_response = Some(response.content);
                state.needs_code_execution = Some(!blocks.is_empty());
                state.code_to_execute = blocks;
            }
            Err(e) => {
                tracing::error!("table analysis LLM call failed: {}", e);
                state.fail(format!("Analysis failed: {}", e));
            }
        }
    }
}

fn overview_response(context: &crate::state::DataContext) -> String {
    format!(
        "Overview of the uploaded data file:

## Data summary
- filename: {filename}
- total rows: {rows}
- total columns: {cols}
- columns: {columns}

## Preview
{preview}

Note: no language model is configured, so only this overview is available. \
Set OPENAI_API_KEY to enable full analysis.",
        filename = context.filename,
        rows = context.total_rows,
        cols = context.total_columns,
        columns = context.columns.join(", "),
        preview = context.preview_string,
    )
}

/// Extract fenced Lua blocks with a single-pass line scanner.
///
/// Capture opens on a line whose trimmed content starts with the tagged
/// fence and closes on a trimmed bare fence; the body is kept verbatim.
/// Nested fences are not supported.
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(CODE_FENCE_OPEN) {
            in_block = true;
            current.clear();
        } else if trimmed == CODE_FENCE_CLOSE && in_block {
            in_block = false;
            if !current.is_empty() {
                blocks.push(current.join("\n"));
            }
        } else if in_block {
            current.push(line);
        }
    }

    blocks
}
