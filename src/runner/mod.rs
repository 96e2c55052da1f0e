//! Task execution
//!
//! A [`TaskExecutor`] runs an [`Agent`] on an input and produces a
//! [`RunOutput`]. Streaming runs hand back a [`StreamedRun`]: events arrive
//! over a channel while the run proceeds on its own task, and the final output
//! resolves once the event stream is exhausted.

use crate::agents::Agent;
use crate::llm::LlmError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod llm_runner;

pub use llm_runner::LlmRunner;

const EVENT_BUFFER: usize = 64;

/// Runs agents
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run to completion and return the final output
    async fn run(&self, agent: &Agent, input: &str) -> Result<RunOutput, ExecutorError>;

    /// Start a run whose progress can be observed as events
    async fn run_streamed(&self, agent: &Agent, input: String)
        -> Result<StreamedRun, ExecutorError>;
}

/// Final output of an agent run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub agent_name: String,
    pub final_output: String,
}

impl RunOutput {
    pub fn new(agent_name: impl Into<String>, final_output: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            final_output: final_output.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.final_output
    }

    /// Deserialize the final output as `T`; any schema mismatch is an error
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T, ExecutorError> {
        serde_json::from_str(&self.final_output).map_err(|e| ExecutorError::OutputParse {
            agent: self.agent_name.clone(),
            message: e.to_string(),
        })
    }
}

/// Observable step of a streamed run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TextDelta(String),
    ToolCalled { name: String },
    ToolOutput { name: String, output: String },
    TurnCompleted { turn: usize },
}

/// Sending half of a streamed run's event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RunEvent>,
}

impl EventSink {
    /// Send an event; a consumer that stopped listening is not an error
    pub async fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// Handle to a run executing on its own task
///
/// Dropping the handle aborts the run.
pub struct StreamedRun {
    events: mpsc::Receiver<RunEvent>,
    handle: Option<JoinHandle<Result<RunOutput, ExecutorError>>>,
}

impl StreamedRun {
    /// Spawn `run` with a sink for its events
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = Result<RunOutput, ExecutorError>> + Send + 'static,
    {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(run(EventSink { tx }));
        Self {
            events,
            handle: Some(handle),
        }
    }

    /// Next event, or `None` once the run has stopped emitting
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Drain remaining events and wait for the run's result
    pub async fn final_output(mut self) -> Result<RunOutput, ExecutorError> {
        while self.events.recv().await.is_some() {}

        let handle = self
            .handle
            .take()
            .ok_or_else(|| ExecutorError::Aborted("run already consumed".to_string()))?;

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ExecutorError::Aborted(e.to_string())),
        }
    }
}

impl Drop for StreamedRun {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Task execution errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("{agent}: LLM request failed: {source}")]
    Llm {
        agent: String,
        #[source]
        source: LlmError,
    },

    #[error("{agent}: output did not match the expected schema: {message}")]
    OutputParse { agent: String, message: String },

    #[error("{agent}: exceeded maximum turns ({max_turns})")]
    MaxTurnsExceeded { agent: String, max_turns: usize },

    #[error("{agent}: timed out after {timeout:?}")]
    Timeout { agent: String, timeout: Duration },

    #[error("{agent}: produced no output")]
    EmptyOutput { agent: String },

    #[error("Run aborted: {0}")]
    Aborted(String),

    #[error("Run failed: {0}")]
    Failed(String),
}
