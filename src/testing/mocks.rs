//! Mock implementations for testing
//!
//! Provides a scripted TaskExecutor, a scripted LlmProvider and a Progress
//! recorder so the pipeline can be exercised without network access.

use crate::agents::Agent;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    ToolCall,
};
use crate::progress::Progress;
use crate::runner::{EventSink, ExecutorError, RunEvent, RunOutput, StreamedRun, TaskExecutor};
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum MockOutcome {
    Output(String),
    Failure(String),
    Panic(String),
}

/// Scripted result of one agent run
#[derive(Debug, Clone)]
pub struct MockResponse {
    outcome: MockOutcome,
    delay: Duration,
    stream_events: usize,
    stream_interval: Duration,
    tool_calls: Vec<(String, String)>,
}

impl MockResponse {
    fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            stream_events: 0,
            stream_interval: Duration::ZERO,
            tool_calls: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Output(text.into()))
    }

    pub fn json(value: Value) -> Self {
        Self::with_outcome(MockOutcome::Output(value.to_string()))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Failure(message.into()))
    }

    /// The run panics instead of returning
    pub fn panic(message: impl Into<String>) -> Self {
        Self::with_outcome(MockOutcome::Panic(message.into()))
    }

    /// Wait this long before producing the result
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// When streamed, emit `count` text deltas spaced by `interval`
    pub fn with_stream_events(mut self, count: usize, interval: Duration) -> Self {
        self.stream_events = count;
        self.stream_interval = interval;
        self
    }

    /// Call the agent's tools as `(tool name, input)` before producing the result
    pub fn with_tool_calls(mut self, calls: Vec<(&str, &str)>) -> Self {
        self.tool_calls = calls
            .into_iter()
            .map(|(name, input)| (name.to_string(), input.to_string()))
            .collect();
        self
    }
}

#[derive(Debug, Clone)]
struct MockRule {
    agent: String,
    input_contains: Option<String>,
    response: MockResponse,
}

/// One recorded executor invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub agent: String,
    pub input: String,
    pub streamed: bool,
}

/// Result of a tool the mock called on an agent's behalf
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedToolResult {
    pub tool: String,
    pub result: Result<String, String>,
}

/// Task executor answering from rules keyed by agent name and input
///
/// A rule with an input filter wins over a plain agent rule.
#[derive(Debug, Clone, Default)]
pub struct MockTaskExecutor {
    rules: Vec<MockRule>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    tool_results: Arc<Mutex<Vec<RecordedToolResult>>>,
}

impl MockTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_agent(mut self, agent: &str, response: MockResponse) -> Self {
        self.rules.push(MockRule {
            agent: agent.to_string(),
            input_contains: None,
            response,
        });
        self
    }

    pub fn on_input(mut self, agent: &str, input_contains: &str, response: MockResponse) -> Self {
        self.rules.push(MockRule {
            agent: agent.to_string(),
            input_contains: Some(input_contains.to_string()),
            response,
        });
        self
    }

    fn find_response(&self, agent: &str, input: &str) -> Option<MockResponse> {
        let for_agent = || self.rules.iter().filter(move |rule| rule.agent == agent);

        for_agent()
            .find(|rule| {
                rule.input_contains
                    .as_deref()
                    .is_some_and(|needle| input.contains(needle))
            })
            .or_else(|| for_agent().find(|rule| rule.input_contains.is_none()))
            .map(|rule| rule.response.clone())
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn inputs_for(&self, agent: &str) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.agent == agent)
            .map(|call| call.input.clone())
            .collect()
    }

    pub async fn tool_results(&self) -> Vec<RecordedToolResult> {
        self.tool_results.lock().await.clone()
    }

    async fn record(&self, agent: &Agent, input: &str, streamed: bool) {
        self.calls.lock().await.push(RecordedCall {
            agent: agent.name.clone(),
            input: input.to_string(),
            streamed,
        });
    }

    async fn respond(
        &self,
        agent: &Agent,
        response: Option<MockResponse>,
        sink: Option<&EventSink>,
    ) -> Result<RunOutput, ExecutorError> {
        let response = response.ok_or_else(|| {
            ExecutorError::Failed(format!("no mock response for {}", agent.name))
        })?;

        if let Some(sink) = sink {
            for i in 0..response.stream_events {
                tokio::time::sleep(response.stream_interval).await;
                sink.emit(RunEvent::TextDelta(format!("chunk {i} "))).await;
            }
        }

        if !response.tool_calls.is_empty() {
            let registry = ToolRegistry::from_tools(agent.tools.iter().cloned());
            for (tool, input) in &response.tool_calls {
                if let Some(sink) = sink {
                    sink.emit(RunEvent::ToolCalled { name: tool.clone() }).await;
                }
                let result = registry
                    .execute_tool(tool, &json!({ "input": input }))
                    .await
                    .map(|value| value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
                    .map_err(|e| e.to_string());
                if let Some(sink) = sink {
                    let output = result.clone().unwrap_or_else(|e| e);
                    sink.emit(RunEvent::ToolOutput {
                        name: tool.clone(),
                        output,
                    })
                    .await;
                }
                self.tool_results.lock().await.push(RecordedToolResult {
                    tool: tool.clone(),
                    result,
                });
            }
        }

        tokio::time::sleep(response.delay).await;

        match response.outcome {
            MockOutcome::Output(text) => Ok(RunOutput::new(&agent.name, text)),
            MockOutcome::Failure(message) => Err(ExecutorError::Failed(message)),
            MockOutcome::Panic(message) => panic!("{message}"),
        }
    }
}

#[async_trait]
impl TaskExecutor for MockTaskExecutor {
    async fn run(&self, agent: &Agent, input: &str) -> Result<RunOutput, ExecutorError> {
        self.record(agent, input, false).await;
        let response = self.find_response(&agent.name, input);
        self.respond(agent, response, None).await
    }

    async fn run_streamed(
        &self,
        agent: &Agent,
        input: String,
    ) -> Result<StreamedRun, ExecutorError> {
        self.record(agent, &input, true).await;
        let response = self.find_response(&agent.name, &input);
        let executor = self.clone();
        let agent = agent.clone();

        Ok(StreamedRun::spawn(move |sink| async move {
            executor.respond(&agent, response, Some(&sink)).await
        }))
    }
}

/// Mock LLM provider for testing
///
/// Returns the scripted responses in order, cycling when they run out, and
/// records every request it receives.
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<CompletionResponse>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![Self::text_response(response)])
    }

    pub fn text_response(content: impl Into<String>) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.into()),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            tool_calls: None,
            metadata: HashMap::new(),
        }
    }

    /// Response asking for tool calls, given as `(tool name, arguments)`
    pub fn tool_call_response(calls: Vec<(&str, Value)>) -> CompletionResponse {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments,
            })
            .collect();

        CompletionResponse {
            content: None,
            finish_reason: FinishReason::ToolCalls,
            tool_calls: Some(tool_calls),
            ..Self::text_response("")
        }
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        *self.current_response.lock().await
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        let mut current = self.current_response.lock().await;
        *current += 1;

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        if self.responses.is_empty() {
            return Ok(Self::text_response("Mock response"));
        }

        let response_idx = (*current - 1) % self.responses.len();
        Ok(self.responses[response_idx].clone())
    }
}

/// Progress call captured by [`RecordingProgress`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Update {
        id: String,
        content: String,
        is_done: bool,
        hide_checkmark: bool,
    },
    Done {
        id: String,
    },
    End,
}

/// Progress reporter that keeps every call for later assertions
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    /// Contents written to one status line, in order
    pub async fn updates_for(&self, id: &str) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Update {
                    id: event_id,
                    content,
                    ..
                } if event_id == id => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn was_marked_done(&self, id: &str) -> bool {
        self.events.lock().await.iter().any(|event| match event {
            ProgressEvent::Done { id: event_id } => event_id == id,
            ProgressEvent::Update {
                id: event_id,
                is_done,
                ..
            } => event_id == id && *is_done,
            ProgressEvent::End => false,
        })
    }

    pub async fn ended(&self) -> bool {
        self.events.lock().await.contains(&ProgressEvent::End)
    }
}

#[async_trait]
impl Progress for RecordingProgress {
    async fn update_item(&self, id: &str, content: &str, is_done: bool, hide_checkmark: bool) {
        self.events.lock().await.push(ProgressEvent::Update {
            id: id.to_string(),
            content: content.to_string(),
            is_done,
            hide_checkmark,
        });
    }

    async fn mark_item_done(&self, id: &str) {
        self.events.lock().await.push(ProgressEvent::Done { id: id.to_string() });
    }

    async fn end(&self) {
        self.events.lock().await.push(ProgressEvent::End);
    }
}
