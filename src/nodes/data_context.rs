//! Data context loading node

use std::sync::Arc;

use crate::state::{AgentState, DataContext};
use crate::table::TableSource;

/// Loads the full table and derives the structured context the analyzer
/// embeds in its prompt. Missing or unreadable sources are fatal to the
/// run; there is no retry.
pub struct DataContextLoader {
    source: Arc<dyn TableSource>,
    max_preview_rows: usize,
}

impl DataContextLoader {
    pub fn new(source: Arc<dyn TableSource>, max_preview_rows: usize) -> Self {
        Self {
            source,
            max_preview_rows,
        }
    }

    pub fn run(&self, state: &mut AgentState) {
        let Some(file_info) = state.file_info.clone() else {
            tracing::error!("no file info in session");
            state.fail("No file has been uploaded for this session");
            return;
        };

        tracing::debug!(filename = %file_info.filename, "loading table");
        let df = match self.source.load(&file_info) {
            Ok(df) => df,
            Err(e) => {
                tracing::error!("failed to read data file: {}", e);
                state.fail(format!("Failed to read the data file: {}", e));
                return;
            }
        };
        tracing::info!(rows = df.n_rows(), columns = df.n_columns(), "table loaded");

        let preview_rows = self.max_preview_rows.min(df.n_rows());
        state.data_context = Some(DataContext {
            filename: file_info.filename.clone(),
            total_rows: df.n_rows(),
            total_columns: df.n_columns(),
            columns: df.columns().to_vec(),
            dtypes: df.dtypes().iter().map(|d| d.to_string()).collect(),
            preview_records: df.preview_records(preview_rows),
            preview_string: df.preview_string(preview_rows),
        });
        state.dataframe = Some(Arc::new(df));
    }
}
