//! Research pipeline: Plan, Search, Synthesize, Verify
//!
//! [`ResearchManager`] sequences the stages, threads data between them and
//! reports progress and spans as it goes. Search is the only concurrent
//! stage; everything else runs one agent at a time.

pub mod orchestrator;
pub mod output;
pub mod state;
pub mod ticker;

pub use orchestrator::{search, summary_extractor, ResearchManager, RunContext, SearchOutcome};
pub use output::ResearchOutput;
pub use state::RunState;
pub use ticker::{ProgressTicker, WRITING_UPDATES};
