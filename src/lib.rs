//! Financial research pipeline over LLM agents
//!
//! A research run turns a natural-language query into a verified report in
//! four stages:
//!
//! 1. **Plan**: a planner agent proposes web searches
//! 2. **Search**: every search runs concurrently; individual failures are dropped
//! 3. **Synthesize**: a writer agent streams a structured report and may call
//!    fundamentals and risk analysts as tools
//! 4. **Verify**: an auditor agent checks the report for consistency
//!
//! # Quick Start
//!
//! ```no_run
//! use finresearch::agents::ResearchAgents;
//! use finresearch::llm::{OpenAiConfig, OpenAiProvider};
//! use finresearch::observability::TracingTracer;
//! use finresearch::pipeline::ResearchManager;
//! use finresearch::progress::ConsolePrinter;
//! use finresearch::runner::LlmRunner;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiProvider::new(OpenAiConfig {
//!     api_key: std::env::var("OPENAI_API_KEY")?,
//!     ..Default::default()
//! })?;
//! let manager = ResearchManager::new(
//!     Arc::new(LlmRunner::new(Arc::new(provider))),
//!     ResearchAgents::default(),
//!     Arc::new(ConsolePrinter::stderr()),
//!     Arc::new(TracingTracer::new()),
//! );
//!
//! let output = manager.run("Write up an analysis of Apple Inc.'s most recent quarter.").await?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod testing;
pub mod tools;

pub use config::ResearchConfig;
pub use error::{ResearchError, ResearchResult, Stage};
pub use pipeline::{ResearchManager, ResearchOutput};
pub use runner::{LlmRunner, RunOutput, TaskExecutor};
