//! Run state machine
//!
//! A run moves strictly forward through its stages. Anything else is a bug in
//! the orchestrator and is reported as [`ResearchError::InvalidTransition`].

use crate::error::ResearchError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Start,
    Planned,
    Searched,
    Synthesized,
    Verified,
    Done,
}

impl RunState {
    /// The only state this one may move to
    pub fn successor(self) -> Option<RunState> {
        match self {
            RunState::Start => Some(RunState::Planned),
            RunState::Planned => Some(RunState::Searched),
            RunState::Searched => Some(RunState::Synthesized),
            RunState::Synthesized => Some(RunState::Verified),
            RunState::Verified => Some(RunState::Done),
            RunState::Done => None,
        }
    }

    pub fn advance(&mut self, to: RunState) -> Result<(), ResearchError> {
        if self.successor() != Some(to) {
            return Err(ResearchError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        *self = to;
        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        self == RunState::Done
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Start => "start",
            RunState::Planned => "planned",
            RunState::Searched => "searched",
            RunState::Synthesized => "synthesized",
            RunState::Verified => "verified",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}
