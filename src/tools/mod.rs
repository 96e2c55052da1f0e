//! Tool system for agent runs
//!
//! Tools are exposed to the model as callable functions. Every call is
//! validated against the tool's JSON schema before execution. [`AgentTool`]
//! runs another agent as a sub-call; [`builtin`] holds tools that reach
//! external services.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod agent_tool;
pub mod builtin;

pub use agent_tool::{AgentTool, OutputExtractor};
pub use builtin::{WebSearchConfig, WebSearchTool};

/// Callable tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema of the parameters
    fn describe(&self) -> ToolDescription;

    /// Run the tool with parameters already validated against `describe()`
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

/// Tool description sent to the model
#[derive(Debug, Clone)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Name-indexed set of tools available to a single agent run
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an agent's tool list; later duplicates replace earlier ones
    pub fn from_tools<I>(tools: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.describe().name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Descriptions in registration order
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.describe())
            .collect()
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute tool with validated parameters
    pub async fn execute_tool(&self, tool_name: &str, parameters: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(&tool.describe(), parameters)?;

        tool.execute(parameters).await
    }

    /// Validate parameters against the tool's schema
    fn validate_parameters(
        description: &ToolDescription,
        parameters: &Value,
    ) -> Result<(), ToolError> {
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })
    }
}

/// Tool system errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
}
