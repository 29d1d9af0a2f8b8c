//! Workflow stage nodes
//!
//! Each node is a single-purpose unit over `AgentState`: it reads any
//! existing field and writes only the fields it owns. Fatal conditions are
//! recorded with `AgentState::fail`, never returned; the engine checks the
//! error field after every node.

mod analysis;
mod data_context;
mod execution;
mod intent;
mod response;

pub use analysis::{extract_code_blocks, TableAnalyzer};
pub use data_context::DataContextLoader;
pub use execution::CodeExecutor;
pub use intent::IntentClassifier;
pub use response::{DirectResponder, ResponseGenerator, DIRECT_RESPONSE_FALLBACK};
