//! LLM-backed task executor
//!
//! Each run is a tool loop: send the conversation, execute any tool calls the
//! model makes, feed the results back, and stop on the first response without
//! tool calls. Structured agents get their JSON schema attached as the
//! response format.

use super::{EventSink, ExecutorError, RunEvent, RunOutput, StreamedRun, TaskExecutor};
use crate::agents::{Agent, OutputType};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, JsonSchemaDefinition, LlmProvider, LlmStreamEvent,
    Message, ResponseFormat, ToolCall,
};
use crate::tools::{ToolDescription, ToolRegistry};
use crate::{llm_span, tool_span};
use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Clone)]
pub struct LlmRunner {
    provider: Arc<dyn LlmProvider>,
    max_turns: usize,
    call_timeout: Option<Duration>,
}

impl LlmRunner {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_turns: DEFAULT_MAX_TURNS,
            call_timeout: None,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    async fn with_timeout<F>(&self, agent: &Agent, run: F) -> Result<RunOutput, ExecutorError>
    where
        F: Future<Output = Result<RunOutput, ExecutorError>>,
    {
        match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
                ExecutorError::Timeout {
                    agent: agent.name.clone(),
                    timeout,
                }
            })?,
            None => run.await,
        }
    }

    async fn execute(
        &self,
        agent: &Agent,
        input: &str,
        sink: Option<&EventSink>,
    ) -> Result<RunOutput, ExecutorError> {
        let registry = ToolRegistry::from_tools(agent.tools.iter().cloned());
        let tools = registry.descriptions();
        let mut messages = build_initial_messages(agent, input);
        let mut turn = 0;

        loop {
            turn += 1;
            check_turn_limit(agent, turn, self.max_turns)?;

            let request = create_completion_request(agent, messages.clone(), &tools);
            let response = match sink {
                Some(sink) => self.complete_streamed(agent, request, sink).await?,
                None => self
                    .provider
                    .complete(request)
                    .await
                    .map_err(|source| ExecutorError::Llm {
                        agent: agent.name.clone(),
                        source,
                    })?,
            };

            add_assistant_response(&mut messages, &response);

            if let Some(tool_calls) = pending_tool_calls(&response) {
                debug!(
                    agent = %agent.name,
                    turn,
                    tool_count = tool_calls.len(),
                    "Processing tool calls"
                );
                let tool_results = execute_tool_calls(&registry, tool_calls, sink).await;
                add_tool_results(&mut messages, &tool_results);
                if let Some(sink) = sink {
                    sink.emit(RunEvent::TurnCompleted { turn }).await;
                }
                continue;
            }

            if let Some(sink) = sink {
                sink.emit(RunEvent::TurnCompleted { turn }).await;
            }

            let content = response.content.unwrap_or_default();
            if content.trim().is_empty() {
                return Err(ExecutorError::EmptyOutput {
                    agent: agent.name.clone(),
                });
            }

            info!(
                agent = %agent.name,
                turns = turn,
                tokens = response.usage.total_tokens,
                "Agent run completed"
            );
            return Ok(RunOutput::new(&agent.name, content));
        }
    }

    /// One model turn over the provider's stream, forwarding text deltas
    async fn complete_streamed(
        &self,
        agent: &Agent,
        request: CompletionRequest,
        sink: &EventSink,
    ) -> Result<CompletionResponse, ExecutorError> {
        let llm_error = |source| ExecutorError::Llm {
            agent: agent.name.clone(),
            source,
        };

        let mut stream = self
            .provider
            .complete_stream(request)
            .await
            .map_err(llm_error)?;
        let mut completed = None;

        while let Some(event) = stream.next().await {
            match event.map_err(llm_error)? {
                LlmStreamEvent::Delta(text) => sink.emit(RunEvent::TextDelta(text)).await,
                LlmStreamEvent::Completed(response) => completed = Some(response),
            }
        }

        completed.ok_or_else(|| {
            ExecutorError::Aborted(format!(
                "{}: stream ended without a completed response",
                agent.name
            ))
        })
    }
}

#[async_trait]
impl TaskExecutor for LlmRunner {
    async fn run(&self, agent: &Agent, input: &str) -> Result<RunOutput, ExecutorError> {
        let span = llm_span!(agent = %agent.name, model = %agent.model, streamed = false);
        self.with_timeout(agent, self.execute(agent, input, None))
            .instrument(span)
            .await
    }

    async fn run_streamed(
        &self,
        agent: &Agent,
        input: String,
    ) -> Result<StreamedRun, ExecutorError> {
        let runner = self.clone();
        let agent = agent.clone();
        let span = llm_span!(agent = %agent.name, model = %agent.model, streamed = true);

        Ok(StreamedRun::spawn(move |sink| {
            async move {
                runner
                    .with_timeout(&agent, runner.execute(&agent, &input, Some(&sink)))
                    .await
            }
            .instrument(span)
        }))
    }
}

/// System prompt with the current date, followed by the input
fn build_initial_messages(agent: &Agent, input: &str) -> Vec<Message> {
    let now = chrono::Utc::now();
    let system_prompt = format!(
        "{}\n\nCurrent date: {}",
        agent.instructions,
        now.format("%Y-%m-%d")
    );

    vec![Message::system(system_prompt), Message::user(input)]
}

fn create_completion_request(
    agent: &Agent,
    messages: Vec<Message>,
    tools: &[ToolDescription],
) -> CompletionRequest {
    let mut request = CompletionRequest::new(&agent.model, messages);
    if !tools.is_empty() {
        request.tools = Some(tools.to_vec());
    }
    request.response_format = response_format_for(&agent.output);
    request
}

fn response_format_for(output: &OutputType) -> Option<ResponseFormat> {
    match output {
        OutputType::Text => None,
        OutputType::Structured { name, schema } => Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaDefinition {
                name: name.clone(),
                strict: None,
                schema: schema.clone(),
            },
        }),
    }
}

fn check_turn_limit(agent: &Agent, turn: usize, max_turns: usize) -> Result<(), ExecutorError> {
    if turn > max_turns {
        return Err(ExecutorError::MaxTurnsExceeded {
            agent: agent.name.clone(),
            max_turns,
        });
    }
    Ok(())
}

fn pending_tool_calls(response: &CompletionResponse) -> Option<&[ToolCall]> {
    response
        .tool_calls
        .as_deref()
        .filter(|calls| !calls.is_empty())
}

/// Record the assistant turn; tool-only turns are summarized so the model sees its own calls
fn add_assistant_response(messages: &mut Vec<Message>, response: &CompletionResponse) {
    if let Some(content) = response.content.as_ref().filter(|c| !c.is_empty()) {
        messages.push(Message::assistant(content.clone()));
    } else if let Some(tool_calls) = pending_tool_calls(response) {
        let calls: Vec<String> = tool_calls
            .iter()
            .map(|call| format!("{}({})", call.name, call.arguments))
            .collect();
        messages.push(Message::assistant(format!("Calling tools: {}", calls.join(", "))));
    }
}

fn add_tool_results(messages: &mut Vec<Message>, tool_results: &[String]) {
    if !tool_results.is_empty() {
        messages.push(Message::user(format!(
            "Tool results:\n{}",
            tool_results.join("\n")
        )));
    }
}

/// Run each call in order; failures become text for the model rather than errors
async fn execute_tool_calls(
    registry: &ToolRegistry,
    tool_calls: &[ToolCall],
    sink: Option<&EventSink>,
) -> Vec<String> {
    let mut results = Vec::with_capacity(tool_calls.len());

    for call in tool_calls {
        if let Some(sink) = sink {
            sink.emit(RunEvent::ToolCalled {
                name: call.name.clone(),
            })
            .await;
        }

        let span = tool_span!(tool = %call.name, call_id = %call.id);
        let outcome = registry
            .execute_tool(&call.name, &call.arguments)
            .instrument(span)
            .await;

        let result = match outcome {
            Ok(value) => {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                format!("Tool {} returned: {}", call.name, text)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Tool {} failed: {}", call.name, e)
            }
        };

        if let Some(sink) = sink {
            sink.emit(RunEvent::ToolOutput {
                name: call.name.clone(),
                output: result.clone(),
            })
            .await;
        }
        results.push(result);
    }

    results
}
