//! Web search tool backed by the Serper API
//!
//! Gives the search agent live results instead of whatever the model
//! remembers. Results are trimmed to title, link, snippet and (for news-like
//! hits) date before being handed back to the model.

use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const SERPER_BASE_URL: &str = "https://google.serper.dev";

const DEFAULT_NUM_RESULTS: usize = 5;

/// Connection settings for [`WebSearchTool`]
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub api_key: String,
    pub base_url: String,
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: SERPER_BASE_URL.to_string(),
            max_results: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Web search over the Serper API
pub struct WebSearchTool {
    client: reqwest::Client,
    config: WebSearchConfig,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Result<Self, ToolError> {
        if config.api_key.is_empty() {
            return Err(ToolError::InitializationError(
                "Web search API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Build search payload (pure function)
    fn build_search_payload(query: &str, num_results: usize, max_results: usize) -> Value {
        json!({
            "q": query,
            "num": num_results.min(max_results),
            "gl": "us",
            "hl": "en"
        })
    }

    /// Extract number of results from parameters (pure function)
    fn extract_num_results(parameters: &Value) -> usize {
        parameters
            .get("num_results")
            .and_then(|n| n.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_NUM_RESULTS)
    }

    /// Keep the organic hits that have a title and link (pure function)
    fn parse_search_response(search_result: &Value, num_results: usize) -> Vec<Value> {
        let Some(organic) = search_result.get("organic").and_then(|o| o.as_array()) else {
            return Vec::new();
        };

        organic
            .iter()
            .filter_map(|result| {
                let title = result.get("title").and_then(|t| t.as_str())?;
                let link = result.get("link").and_then(|l| l.as_str())?;
                let snippet = result.get("snippet").and_then(|s| s.as_str()).unwrap_or("");

                let mut hit = json!({"title": title, "url": link, "snippet": snippet});
                if let Some(date) = result.get("date").and_then(|d| d.as_str()) {
                    hit["date"] = json!(date);
                }
                Some(hit)
            })
            .take(num_results)
            .collect()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: WEB_SEARCH_TOOL.to_string(),
            description: "Search the web for current news, filings and analyst commentary"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20,
                        "default": DEFAULT_NUM_RESULTS
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let query = parameters["query"]
            .as_str()
            .ok_or_else(|| ToolError::ExecutionError("Query parameter is required".to_string()))?;
        let num_results = Self::extract_num_results(parameters);
        let payload = Self::build_search_payload(query, num_results, self.config.max_results);

        debug!(query = %query, num_results, "Web search");

        let response = self
            .client
            .post(format!("{}/search", self.config.base_url))
            .header("X-API-KEY", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::ExecutionError(format!(
                "Search API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let search_result: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to parse response: {e}")))?;

        let results = Self::parse_search_response(&search_result, num_results);
        Ok(json!({"query": query, "results": results}))
    }
}
