//! finresearch - command line entry point
//!
//! Runs one research query end to end. Progress and logs go to stderr; the
//! rendered report is the only thing written to stdout.

use clap::Parser;
use finresearch::agents::ResearchAgents;
use finresearch::config::ResearchConfig;
use finresearch::error::{ResearchError, ResearchResult};
use finresearch::llm::{OpenAiConfig, OpenAiProvider};
use finresearch::observability::{init_default_logging, metrics, TracingTracer};
use finresearch::pipeline::ResearchManager;
use finresearch::progress::ConsolePrinter;
use finresearch::runner::LlmRunner;
use finresearch::tools::{Tool, WebSearchTool};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};

const DEFAULT_CONFIG_PATH: &str = "research.toml";

/// Financial research agent
#[derive(Parser)]
#[command(name = "finresearch")]
#[command(about = "Plan, search, write and verify a financial research report")]
#[command(version)]
struct Cli {
    /// Financial research query to execute
    #[arg(short, long)]
    query: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(verbosity_level(cli.verbose));

    if let Err(e) = run(cli).await {
        error!(error = %e.sanitized_message(), "Research failed");
        eprintln!("Error: {}", e.sanitized_message());
        process::exit(1);
    }
}

fn verbosity_level(verbose: u8) -> Option<Level> {
    match verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

async fn run(cli: Cli) -> ResearchResult<()> {
    let config = load_configuration(cli.config.as_deref())?;

    let query = match cli.query {
        Some(query) => query,
        None => prompt_for_query()?,
    };
    let query = query.trim();
    if query.is_empty() {
        return Err(ResearchError::invalid_input("query must not be empty"));
    }

    let manager = build_manager(&config)?;
    let output = manager.run(query).await?;

    println!("{output}");

    let snapshot = metrics().snapshot();
    info!(
        searches_succeeded = snapshot.searches_succeeded,
        searches_failed = snapshot.searches_failed,
        avg_run_duration_ms = snapshot.avg_run_duration_ms,
        "Run metrics"
    );

    Ok(())
}

fn load_configuration(path: Option<&Path>) -> ResearchResult<ResearchConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ResearchConfig::load_from_file(path)?)
        }
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                info!("Loading configuration from: {}", default_path.display());
                Ok(ResearchConfig::load_from_file(default_path)?)
            } else {
                info!("No configuration file found, using defaults");
                Ok(ResearchConfig::default())
            }
        }
    }
}

fn prompt_for_query() -> ResearchResult<String> {
    print!("Enter a financial research query: ");
    io::stdout()
        .flush()
        .map_err(|e| ResearchError::internal_error(format!("Failed to write prompt: {e}")))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| ResearchError::invalid_input(format!("Failed to read query: {e}")))?;

    Ok(line)
}

fn build_manager(config: &ResearchConfig) -> ResearchResult<ResearchManager> {
    let mut openai_config = OpenAiConfig {
        api_key: config.get_llm_api_key()?,
        timeout: Duration::from_secs(config.llm.timeout_secs),
        ..Default::default()
    };
    if let Some(base_url) = &config.llm.base_url {
        openai_config.base_url = base_url.clone();
    }

    let provider = OpenAiProvider::new(openai_config)?;
    let runner = LlmRunner::new(Arc::new(provider))
        .with_max_turns(config.pipeline.max_turns)
        .with_call_timeout(config.pipeline.call_timeout());

    let agents = ResearchAgents::from_models(&config.agents)
        .with_search_tools(build_search_tools(config)?);

    Ok(ResearchManager::new(
        Arc::new(runner),
        agents,
        Arc::new(ConsolePrinter::stderr()),
        Arc::new(TracingTracer::new()),
    )
    .with_progress_interval(config.pipeline.progress_interval()))
}

fn build_search_tools(config: &ResearchConfig) -> ResearchResult<Vec<Arc<dyn Tool>>> {
    match config.web_search_config()? {
        Some(search_config) => {
            let tool: Arc<dyn Tool> = Arc::new(WebSearchTool::new(search_config)?);
            Ok(vec![tool])
        }
        None => {
            warn!("Web search disabled; search summaries come from model knowledge only");
            Ok(Vec::new())
        }
    }
}
