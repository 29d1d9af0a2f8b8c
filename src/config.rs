//! Agent configuration
//!
//! All knobs the workflow reads at runtime live here: the multilingual
//! keyword list for intent classification, preview and chunking sizes, and
//! the code execution timeout. Defaults match the reference deployment;
//! `from_env` overlays `TABLEFLOW_*` environment variables.

use std::time::Duration;

/// Keywords that mark a message as table-related without consulting the LLM.
/// English plus Chinese equivalents; matching is case-insensitive substring.
pub const TABLE_RELATED_KEYWORDS: &[&str] = &[
    "数据", "表格", "统计", "分析", "查询", "筛选", "排序", "汇总",
    "平均", "最大", "最小", "总和", "计数", "图表", "可视化",
    "data", "table", "statistics", "analysis", "query", "filter",
    "sort", "summary", "average", "max", "min", "sum", "count",
    "chart", "visualization", "行", "列", "字段", "row", "column", "field",
];

/// Runtime configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Keywords for the intent classifier fast path
    pub table_keywords: Vec<String>,

    /// Number of data rows included in the table preview (header excluded)
    pub max_preview_rows: usize,

    /// Character budget for one response chunk
    pub chunk_size: usize,

    /// Pacing delay between response chunks
    pub chunk_delay: Duration,

    /// Hard wall-clock timeout for one sandboxed code block
    pub code_timeout: Duration,

    /// Capacity of the bounded event queue between driver and transport
    pub queue_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            table_keywords: TABLE_RELATED_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_preview_rows: 20,
            chunk_size: 50,
            chunk_delay: Duration::from_millis(100),
            code_timeout: Duration::from_secs(30),
            queue_capacity: 32,
        }
    }
}

impl AgentConfig {
    /// Build a config from defaults plus `TABLEFLOW_*` environment overrides.
    ///
    /// Unparseable values are ignored with a warning rather than failing
    /// startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = read_env_usize("TABLEFLOW_MAX_PREVIEW_ROWS") {
            config.max_preview_rows = v;
        }
        if let Some(v) = read_env_usize("TABLEFLOW_CHUNK_SIZE") {
            config.chunk_size = v;
        }
        if let Some(v) = read_env_u64("TABLEFLOW_CHUNK_DELAY_MS") {
            config.chunk_delay = Duration::from_millis(v);
        }
        if let Some(v) = read_env_u64("TABLEFLOW_CODE_TIMEOUT_SECS") {
            config.code_timeout = Duration::from_secs(v);
        }
        if let Some(v) = read_env_usize("TABLEFLOW_QUEUE_CAPACITY") {
            config.queue_capacity = v.max(1);
        }

        config
    }
}

fn read_env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("{} set but not a valid integer: {}", name, raw);
            None
        }
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("{} set but not a valid integer: {}", name, raw);
            None
        }
    }
}
