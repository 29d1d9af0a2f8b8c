//! tableflow CLI
//!
//! Usage:
//!   tableflow ask data.csv "What is the average amount?"
//!   tableflow ask data.csv "求平均值" --stream
//!   tableflow inspect data.csv

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tableflow::llm::api::{OpenAiClient, OpenAiConfig};
use tableflow::{
    AgentConfig, ChatService, CsvTableSource, FileInfo, LlmClient, MemorySessionStore,
    SessionStore, StreamEvent, Workflow,
};

/// tableflow - table analysis chat workflow engine
#[derive(Parser, Debug)]
#[command(name = "tableflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question about a data file
    Ask {
        /// Path to a CSV or TSV file
        file: PathBuf,

        /// The question
        message: String,

        /// Print events as they stream instead of only the final reply
        #[arg(short, long)]
        stream: bool,

        /// OpenAI-compatible API base URL
        #[arg(long)]
        api_base: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Run without any LLM backend
        #[arg(long)]
        no_llm: bool,
    },

    /// Print structure and preview of a data file
    Inspect {
        /// Path to a CSV or TSV file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => tracing::Level::ERROR,
        (_, 0) => tracing::Level::WARN,
        (_, 1) => tracing::Level::INFO,
        (_, 2) => tracing::Level::DEBUG,
        (_, _) => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask {
            file,
            message,
            stream,
            api_base,
            model,
            no_llm,
        } => ask(file, message, stream, api_base, model, no_llm),

        Commands::Inspect { file } => inspect(file),
    }
}

fn ask(
    file: PathBuf,
    message: String,
    stream: bool,
    api_base: Option<String>,
    model: Option<String>,
    no_llm: bool,
) -> Result<()> {
    let config = AgentConfig::from_env();
    let llm = if no_llm { None } else { build_llm(api_base, model) };
    if llm.is_none() && !no_llm {
        eprintln!("note: no API key configured, running without an LLM");
    }

    let workflow = Arc::new(Workflow::new(&config, llm, Arc::new(CsvTableSource::new())));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let service = ChatService::new(workflow, store, config);

    let session = service.create_session();
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file path has no usable name")?
        .to_string();
    service.attach_file(session.id, FileInfo::new(filename, &file))?;

    let mut failed = false;
    for event in service.chat(session.id, &message)? {
        match event {
            StreamEvent::Thinking { content } => {
                if stream {
                    eprint!("[thinking] {}", content);
                }
            }
            StreamEvent::Response { content } => {
                if stream {
                    println!("{}", content);
                } else {
                    print!("{} ", content);
                }
            }
            StreamEvent::Error { content } => {
                eprintln!("error: {}", content);
                failed = true;
            }
            StreamEvent::Done => {
                if !stream {
                    println!();
                }
            }
        }
    }

    if failed {
        anyhow::bail!("the run did not complete");
    }
    Ok(())
}

fn inspect(file: PathBuf) -> Result<()> {
    let config = AgentConfig::from_env();
    let workflow = Workflow::new(&config, None, Arc::new(CsvTableSource::new()));

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file path has no usable name")?
        .to_string();

    let store = MemorySessionStore::new();
    let session = store.create();
    store.set_file_info(session.id, FileInfo::new(filename, &file))?;
    let session = store
        .get(session.id)
        .context("session disappeared from the store")?;

    let context = workflow
        .data_summary(&session)
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("file:    {}", context.filename);
    println!("rows:    {}", context.total_rows);
    println!("columns: {}", context.total_columns);
    for (name, dtype) in context.columns.iter().zip(&context.dtypes) {
        println!("  {}  ({})", name, dtype);
    }
    println!("\n{}", context.preview_string);
    Ok(())
}

fn build_llm(api_base: Option<String>, model: Option<String>) -> Option<Arc<dyn LlmClient>> {
    let mut config = OpenAiConfig::from_env()?;
    if let Some(base) = api_base {
        config.api_base = base;
    }
    if let Some(model) = model {
        config.model = model;
    }
    Some(Arc::new(OpenAiClient::new(config)))
}
