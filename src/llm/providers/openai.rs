//! OpenAI provider implementation
//!
//! Chat-completions client with structured output, tool calling and
//! server-sent-event streaming. Works against any OpenAI-compatible base URL.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmStream,
    LlmStreamEvent, Message, MessageRole, ResponseFormat, TokenUsage, ToolCall as ProviderToolCall,
};
use crate::tools::ToolDescription;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, error, warn};

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Whole-request bound for completions; connect and idle-read bound for streams
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI API key is required".to_string(),
            ));
        }

        // Streams may outlive `timeout`; only connects and idle reads are bounded here
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Estimate token count for messages (pure function)
    fn estimate_token_count(messages: &[OpenAiMessage]) -> usize {
        messages
            .iter()
            .map(|m| m.content.as_ref().map(|c| c.len()).unwrap_or(0) / 4)
            .sum()
    }

    /// Convert completion request to OpenAI format (pure function)
    fn convert_to_openai_request(request: &CompletionRequest) -> OpenAiCompletionRequest {
        let messages = request.messages.iter().map(Self::convert_message).collect();

        let tools = request
            .tools
            .as_ref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(Self::convert_tool).collect());

        let response_format = request.response_format.as_ref().map(|rf| match rf {
            ResponseFormat::Text => OpenAiResponseFormat::Simple {
                format_type: "text".to_string(),
            },
            ResponseFormat::Json => OpenAiResponseFormat::Simple {
                format_type: "json_object".to_string(),
            },
            ResponseFormat::JsonSchema { json_schema } => OpenAiResponseFormat::JsonSchema {
                format_type: "json_schema".to_string(),
                json_schema: OpenAiJsonSchema {
                    name: json_schema.name.clone(),
                    strict: json_schema.strict,
                    schema: json_schema.schema.clone(),
                },
            },
        });

        OpenAiCompletionRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice: request.tool_choice.clone(),
            response_format,
            stream: None,
            stream_options: None,
        }
    }

    /// Parse OpenAI completion response (pure function)
    fn parse_completion_response(
        openai_response: OpenAiCompletionResponse,
        request_metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices returned from OpenAI".to_string())
        })?;

        let usage = openai_response
            .usage
            .map(OpenAiUsage::into_token_usage)
            .unwrap_or_default();

        let tool_calls = choice
            .message
            .tool_calls
            .as_ref()
            .map(|calls| Self::extract_tool_calls(calls))
            .filter(|calls| !calls.is_empty());

        Ok(CompletionResponse {
            content: choice.message.content,
            model: openai_response.model,
            usage,
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
            tool_calls,
            metadata: request_metadata,
        })
    }

    /// Extract tool calls from OpenAI format (pure function)
    fn extract_tool_calls(calls: &[OpenAiToolCall]) -> Vec<ProviderToolCall> {
        calls
            .iter()
            .filter_map(|call| {
                parse_tool_arguments(&call.function.name, &call.function.arguments).map(|args| {
                    ProviderToolCall {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: args,
                    }
                })
            })
            .collect()
    }

    /// Convert OpenAI finish reason to internal format (pure function)
    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    /// Convert internal message to OpenAI format
    fn convert_message(message: &Message) -> OpenAiMessage {
        OpenAiMessage {
            role: match message.role {
                MessageRole::System => "system".to_string(),
                MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: Some(message.content.clone()),
            tool_calls: None,
        }
    }

    /// Convert tool description to OpenAI tool format
    fn convert_tool(tool_desc: &ToolDescription) -> OpenAiTool {
        OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool_desc.name.clone(),
                description: tool_desc.description.clone(),
                parameters: tool_desc.parameters.clone(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let openai_request = Self::convert_to_openai_request(&request);
        self.log_request_info(&openai_request);

        let response = self.send_with_retry(&openai_request).await?;
        let openai_response: OpenAiCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let response = Self::parse_completion_response(openai_response, request.metadata)?;
        self.log_response_info(&response);
        Ok(response)
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<LlmStream, LlmError> {
        let mut openai_request = Self::convert_to_openai_request(&request);
        openai_request.stream = Some(true);
        openai_request.stream_options = Some(OpenAiStreamOptions {
            include_usage: true,
        });
        self.log_request_info(&openai_request);

        let response = self.send_with_retry(&openai_request).await?;
        let mut body = Box::pin(response.bytes_stream());
        let mut assembler = StreamAssembler::new(request.model.clone(), request.metadata);

        let stream = async_stream::stream! {
            let mut pending: Vec<u8> = Vec::new();
            let mut failed = false;

            'read: while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => pending.extend_from_slice(&bytes),
                    Err(e) => {
                        yield Err(LlmError::NetworkError(format!("Stream interrupted: {e}")));
                        failed = true;
                        break;
                    }
                }

                for line in drain_complete_lines(&mut pending) {
                    match assembler.feed_line(&line) {
                        Ok(Some(delta)) => yield Ok(LlmStreamEvent::Delta(delta)),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            failed = true;
                            break 'read;
                        }
                    }
                    if assembler.is_done() {
                        break 'read;
                    }
                }
            }

            if !failed && !assembler.is_done() && !pending.is_empty() {
                let tail = String::from_utf8_lossy(&pending).trim().to_string();
                match assembler.feed_line(&tail) {
                    Ok(Some(delta)) => yield Ok(LlmStreamEvent::Delta(delta)),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        failed = true;
                    }
                }
            }

            if !failed {
                yield assembler.finish().map(LlmStreamEvent::Completed);
            }
        };

        Ok(Box::pin(stream))
    }
}

impl OpenAiProvider {
    /// Log request information (impure)
    fn log_request_info(&self, request: &OpenAiCompletionRequest) {
        let estimated_tokens = Self::estimate_token_count(&request.messages);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            streaming = request.stream.unwrap_or(false),
            estimated_tokens,
            "OpenAI request"
        );

        if estimated_tokens > 120000 {
            warn!(
                "Large request detected: estimated {} tokens, may exceed model limits",
                estimated_tokens
            );
        }
    }

    /// Retry orchestrator - handles only I/O and retry logic (impure)
    async fn send_with_retry(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<reqwest::Response, LlmError> {
        let backoff_delays = [100u64, 200, 300];
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(backoff_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!(
                    "OpenAI retry attempt {} after {}ms delay",
                    attempt, delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(openai_request).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!("OpenAI request succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("OpenAI request attempt {} failed: {}", attempt + 1, e);
                    if !Self::should_retry(&e) {
                        error!("Non-retryable API error, aborting: {}", e);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("OpenAI request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    /// Make single API request, mapping HTTP failures to provider errors (impure I/O)
    async fn make_api_request(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(openai_request);
        if openai_request.stream != Some(true) {
            builder = builder.timeout(self.config.timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                let error_msg = format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                );
                warn!("OpenAI network error details: {}", error_msg);
                LlmError::NetworkError(error_msg)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            return Err(LlmError::ApiError(format!(
                "OpenAI API server error: {status} - {error_text}"
            )));
        }

        error!(
            "OpenAI API client error - Status: {}, Response: {}",
            status, error_text
        );

        match status.as_u16() {
            401 | 403 => Err(LlmError::AuthenticationFailed(format!(
                "OpenAI API error: {status} - {error_text}"
            ))),
            429 => Err(LlmError::RateLimitExceeded(format!(
                "OpenAI API error: {status} - {error_text}"
            ))),
            _ => Err(LlmError::ApiError(format!(
                "OpenAI API error: {status} - {error_text}"
            ))),
        }
    }

    /// Check if error should trigger retry (pure)
    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }

    /// Log response information (impure)
    fn log_response_info(&self, response: &CompletionResponse) {
        debug!(
            "OpenAI response: {} tokens used (prompt: {}, completion: {}), finish_reason: {:?}, tool_calls: {}",
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.finish_reason,
            response.tool_calls.as_ref().map(|tc| tc.len()).unwrap_or(0)
        );
    }
}

/// Parse tool call arguments, dropping calls whose arguments are not JSON
fn parse_tool_arguments(name: &str, arguments: &str) -> Option<serde_json::Value> {
    if arguments.trim().is_empty() {
        return Some(serde_json::Value::Object(Default::default()));
    }
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(args) => Some(args),
        Err(e) => {
            error!(tool = %name, "Failed to parse tool call arguments: {}", e);
            None
        }
    }
}

/// Split off every newline-terminated line from the buffer
fn drain_complete_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}

/// Accumulates SSE chunks into deltas and a final response
struct StreamAssembler {
    model: String,
    metadata: HashMap<String, String>,
    content: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<OpenAiUsage>,
    done: bool,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAssembler {
    fn new(model: String, metadata: HashMap<String, String>) -> Self {
        Self {
            model,
            metadata,
            content: String::new(),
            tool_calls: BTreeMap::new(),
            finish_reason: None,
            usage: None,
            done: false,
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one SSE line, returning any text delta it carried
    fn feed_line(&mut self, line: &str) -> Result<Option<String>, LlmError> {
        let Some(data) = line.strip_prefix("data:") else {
            // Comments, event names and blank separators carry no payload
            return Ok(None);
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }
        if data.is_empty() {
            return Ok(None);
        }

        let chunk: OpenAiStreamChunk = serde_json::from_str(data)
            .map_err(|e| LlmError::InvalidResponse(format!("Malformed stream chunk: {e}")))?;

        if let Some(model) = chunk.model {
            self.model = model;
        }
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        let mut text = String::new();
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            if let Some(content) = choice.delta.content {
                text.push_str(&content);
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(call.index).or_default();
                if let Some(id) = call.id {
                    entry.id = id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
        }

        if text.is_empty() {
            Ok(None)
        } else {
            self.content.push_str(&text);
            Ok(Some(text))
        }
    }

    fn finish(&mut self) -> Result<CompletionResponse, LlmError> {
        if self.finish_reason.is_none() && self.content.is_empty() && self.tool_calls.is_empty()
        {
            return Err(LlmError::InvalidResponse(
                "Stream ended without any output".to_string(),
            ));
        }

        let tool_calls: Vec<ProviderToolCall> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .filter_map(|call| {
                parse_tool_arguments(&call.name, &call.arguments).map(|arguments| {
                    ProviderToolCall {
                        id: call.id,
                        name: call.name,
                        arguments,
                    }
                })
            })
            .collect();

        Ok(CompletionResponse {
            content: (!self.content.is_empty()).then(|| std::mem::take(&mut self.content)),
            model: self.model.clone(),
            usage: self
                .usage
                .take()
                .map(OpenAiUsage::into_token_usage)
                .unwrap_or_default(),
            finish_reason: OpenAiProvider::convert_finish_reason(self.finish_reason.as_deref()),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            metadata: std::mem::take(&mut self.metadata),
        })
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<OpenAiStreamOptions>,
}

#[derive(Debug, Serialize)]
struct OpenAiStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiUsage {
    fn into_token_usage(self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

/// OpenAI response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum OpenAiResponseFormat {
    /// Simple type string
    Simple {
        #[serde(rename = "type")]
        format_type: String,
    },
    /// JSON schema with strict validation
    JsonSchema {
        #[serde(rename = "type")]
        format_type: String,
        json_schema: OpenAiJsonSchema,
    },
}

/// OpenAI JSON Schema format
#[derive(Debug, Serialize, Deserialize)]
struct OpenAiJsonSchema {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
    schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::JsonSchemaDefinition;

    #[test]
    fn test_openai_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_openai_provider_creation_without_api_key() {
        let result = OpenAiProvider::new(OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_message_conversion() {
        let openai_message = OpenAiProvider::convert_message(&Message::user("Hello"));
        assert_eq!(openai_message.role, "user");
        assert_eq!(openai_message.content, Some("Hello".to_string()));
    }

    #[test]
    fn test_finish_reason_conversion() {
        assert_eq!(
            OpenAiProvider::convert_finish_reason(Some("stop")),
            FinishReason::Stop
        );
        assert_eq!(
            OpenAiProvider::convert_finish_reason(Some("tool_calls")),
            FinishReason::ToolCalls
        );
        assert_eq!(
            OpenAiProvider::convert_finish_reason(Some("length")),
            FinishReason::Length
        );
        assert_eq!(
            OpenAiProvider::convert_finish_reason(None),
            FinishReason::Error
        );
    }

    #[test]
    fn test_request_conversion_with_schema_and_tools() {
        let mut request = CompletionRequest::new("gpt-4o", vec![Message::user("Plan")]);
        request.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaDefinition {
                name: "SearchPlan".to_string(),
                strict: Some(true),
                schema: serde_json::json!({"type": "object"}),
            },
        });
        request.tools = Some(vec![ToolDescription {
            name: "risk_analysis".to_string(),
            description: "Red flags".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

        let json = serde_json::to_value(OpenAiProvider::convert_to_openai_request(&request))
            .unwrap();

        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "SearchPlan");
        assert_eq!(json["tools"][0]["function"]["name"], "risk_analysis");
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_empty_tool_list_is_omitted() {
        let mut request = CompletionRequest::new("gpt-4o", vec![Message::user("Hi")]);
        request.tools = Some(vec![]);

        let json = serde_json::to_value(OpenAiProvider::convert_to_openai_request(&request))
            .unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_drain_complete_lines_keeps_partial_tail() {
        let mut pending = b"data: one\n\ndata: tw".to_vec();
        let lines = drain_complete_lines(&mut pending);

        assert_eq!(lines, vec!["data: one".to_string(), String::new()]);
        assert_eq!(pending, b"data: tw".to_vec());
    }

    #[test]
    fn test_assembler_collects_content_and_tool_calls() {
        let mut assembler = StreamAssembler::new("gpt-4.1".to_string(), HashMap::new());

        let first = assembler
            .feed_line(r#"data: {"model":"gpt-4.1-2025","choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap();
        let second = assembler
            .feed_line(r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#)
            .unwrap();
        assembler
            .feed_line(r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"risk_analysis","arguments":"{\"inp"}}]}}]}"#)
            .unwrap();
        assembler
            .feed_line(r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ut\":\"x\"}"}}]},"finish_reason":"tool_calls"}]}"#)
            .unwrap();
        assembler.feed_line("data: [DONE]").unwrap();

        assert_eq!(first.as_deref(), Some("Hel"));
        assert_eq!(second.as_deref(), Some("lo"));
        assert!(assembler.is_done());

        let response = assembler.finish().unwrap();
        assert_eq!(response.content.as_deref(), Some("Hello"));
        assert_eq!(response.model, "gpt-4.1-2025");
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].arguments, serde_json::json!({"input": "x"}));
    }

    #[test]
    fn test_assembler_ignores_non_data_lines() {
        let mut assembler = StreamAssembler::new("m".to_string(), HashMap::new());
        assert_eq!(assembler.feed_line(": keep-alive").unwrap(), None);
        assert_eq!(assembler.feed_line("event: message").unwrap(), None);
        assert_eq!(assembler.feed_line("").unwrap(), None);
    }

    #[test]
    fn test_assembler_rejects_malformed_chunk() {
        let mut assembler = StreamAssembler::new("m".to_string(), HashMap::new());
        let result = assembler.feed_line("data: {not json");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_assembler_finish_without_output_fails() {
        let mut assembler = StreamAssembler::new("m".to_string(), HashMap::new());
        assembler.feed_line("data: [DONE]").unwrap();
        assert!(matches!(
            assembler.finish(),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_should_retry_classification() {
        assert!(OpenAiProvider::should_retry(&LlmError::NetworkError(
            "reset".to_string()
        )));
        assert!(OpenAiProvider::should_retry(&LlmError::ApiError(
            "OpenAI API server error: 503".to_string()
        )));
        assert!(!OpenAiProvider::should_retry(&LlmError::ApiError(
            "OpenAI API error: 400".to_string()
        )));
        assert!(!OpenAiProvider::should_retry(
            &LlmError::AuthenticationFailed("bad key".to_string())
        ));
    }
}
