//! Agent-as-tool adapter
//!
//! Wraps a sub-agent so another agent can call it mid-run. The sub-agent's
//! output goes through an extractor before the caller sees it, so a structured
//! analysis can be reduced to the one field the caller needs.

use crate::agents::Agent;
use crate::runner::{RunOutput, TaskExecutor};
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Projection applied to the sub-agent's output
pub type OutputExtractor = Arc<dyn Fn(&RunOutput) -> Result<String, ToolError> + Send + Sync>;

pub struct AgentTool {
    name: String,
    description: String,
    agent: Agent,
    executor: Arc<dyn TaskExecutor>,
    extractor: OutputExtractor,
}

impl AgentTool {
    pub fn new<F>(
        agent: Agent,
        executor: Arc<dyn TaskExecutor>,
        name: impl Into<String>,
        description: impl Into<String>,
        extractor: F,
    ) -> Self
    where
        F: Fn(&RunOutput) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            agent,
            executor,
            extractor: Arc::new(extractor),
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "The input to send to the analyst"
                    }
                },
                "required": ["input"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let input = parameters
            .get("input")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::ValidationError("'input' must be a string".to_string()))?;

        debug!(tool = %self.name, agent = %self.agent.name, "Running sub-agent");

        let output = self
            .executor
            .run(&self.agent, input)
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        (self.extractor)(&output).map(Value::String)
    }
}
