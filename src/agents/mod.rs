//! Agent capability descriptors
//!
//! An [`Agent`] is a named unit of work: instructions, a model, the shape of
//! its final output and the tools it may call. Agents carry no runtime state;
//! a [`crate::runner::TaskExecutor`] turns one into an actual run.

use crate::tools::Tool;
use schemars::JsonSchema;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

pub mod definitions;
pub mod schemas;

pub use definitions::ResearchAgents;
pub use schemas::{AnalysisSummary, ReportData, SearchItem, SearchPlan, VerificationResult};

/// Shape of an agent's final output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    /// Free-form text
    Text,
    /// JSON conforming to `schema`
    Structured { name: String, schema: Value },
}

impl OutputType {
    /// Structured output described by the JSON schema of `T`
    pub fn structured<T: JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let name = root
            .schema
            .metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| "output".to_string());
        let schema = serde_json::to_value(&root).unwrap_or_else(|_| json!({"type": "object"}));

        OutputType::Structured { name, schema }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, OutputType::Structured { .. })
    }
}

/// A named capability with its own instructions, model and output shape
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub output: OutputType,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            output: OutputType::Text,
            tools: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: OutputType) -> Self {
        self.output = output;
        self
    }

    /// Copy of this agent that may call `tools`, replacing any it had
    pub fn with_tools(&self, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools,
            ..self.clone()
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.describe().name).collect()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("output", &self.output)
            .field("tools", &self.tool_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_output_uses_type_title() {
        match OutputType::structured::<SearchPlan>() {
            OutputType::Structured { name, schema } => {
                assert_eq!(name, "SearchPlan");
                assert!(schema["properties"]["searches"].is_object());
                let required = schema["required"].as_array().unwrap();
                assert!(required.contains(&json!("searches")));
            }
            OutputType::Text => panic!("expected structured output"),
        }
    }

    #[test]
    fn test_new_agent_defaults_to_text_without_tools() {
        let agent = Agent::new("Echo", "Repeat the input", "gpt-4o");
        assert_eq!(agent.output, OutputType::Text);
        assert!(agent.tools.is_empty());
        assert!(!agent.output.is_structured());
    }

    #[test]
    fn test_debug_lists_tool_names_only() {
        let agent = Agent::new("Writer", "long prompt body", "gpt-4.1");
        let debug = format!("{agent:?}");
        assert!(debug.contains("Writer"));
        assert!(!debug.contains("long prompt body"));
    }
}
