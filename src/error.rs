//! Error types for the research pipeline
//!
//! Stage-fatal failures are wrapped in [`ResearchError::Stage`] so callers can
//! tell which part of the run aborted. Per-search failures never reach this type;
//! they are converted to `SearchOutcome::Failed` inside the fan-out.

use crate::runner::ExecutorError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

const MAX_MESSAGE_LEN: usize = 500;

/// Pipeline stage a fatal error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Synthesize,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Plan => "plan",
            Stage::Synthesize => "synthesize",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Main error type for research runs
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ExecutorError,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    LlmError(#[from] crate::llm::LlmError),

    #[error("Tool error: {0}")]
    ToolError(#[from] crate::tools::ToolError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ResearchError {
    /// Wrap an executor failure as fatal for the given stage
    pub fn stage(stage: Stage, source: ExecutorError) -> Self {
        Self::Stage { stage, source }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Stage this error aborted, if it was stage-fatal
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            ResearchError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Message safe to show to a user or write to a span status
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Redact credentials and sensitive paths, then cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(re) = SECRET_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(re) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for research operations
pub type ResearchResult<T> = Result<T, ResearchError>;
