//! Configuration for research runs
//!
//! Loaded from a TOML file (`research.toml` by default). Every section is
//! optional; missing values fall back to the defaults below. Secrets are never
//! stored in the file, only the name of the environment variable holding them.

use crate::tools::WebSearchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level research configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agents: AgentModels,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub search: SearchSection,
}

/// LLM provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (currently only "openai")
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Override for the provider base URL (OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// HTTP timeout per request in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key_env: default_api_key_env(),
            base_url: None,
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Model used by each agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentModels {
    #[serde(default = "default_reasoning_model")]
    pub planner: String,
    #[serde(default = "default_writing_model")]
    pub search: String,
    #[serde(default = "default_writing_model")]
    pub writer: String,
    #[serde(default = "default_reasoning_model")]
    pub verifier: String,
    #[serde(default = "default_writing_model")]
    pub financials: String,
    #[serde(default = "default_writing_model")]
    pub risk: String,
}

impl Default for AgentModels {
    fn default() -> Self {
        Self {
            planner: default_reasoning_model(),
            search: default_writing_model(),
            writer: default_writing_model(),
            verifier: default_reasoning_model(),
            financials: default_writing_model(),
            risk: default_writing_model(),
        }
    }
}

impl AgentModels {
    fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("planner", &self.planner),
            ("search", &self.search),
            ("writer", &self.writer),
            ("verifier", &self.verifier),
            ("financials", &self.financials),
            ("risk", &self.risk),
        ]
    }
}

/// Orchestration knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    /// Minimum seconds between cosmetic progress updates while the report streams
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// Upper bound on model turns per agent run (tool-call loop)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Optional timeout for a single agent run, in seconds
    pub call_timeout_secs: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            progress_interval_secs: default_progress_interval(),
            max_turns: default_max_turns(),
            call_timeout_secs: None,
        }
    }
}

impl PipelineSection {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

/// Web search backing the search agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSection {
    /// Give the search agent the `web_search` tool
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment variable containing the Serper API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
    /// Override for the search API base URL
    pub base_url: Option<String>,
    /// Upper bound on results per search call
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_search_api_key_env(),
            base_url: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_http_timeout() -> u64 {
    60
}

fn default_reasoning_model() -> String {
    "gpt-4o".to_string()
}

fn default_writing_model() -> String {
    "gpt-4.1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_api_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_search_timeout() -> u64 {
    30
}

fn default_progress_interval() -> u64 {
    5
}

fn default_max_turns() -> usize {
    10
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ResearchConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ResearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and provider support
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        if let Some((agent, _)) = self
            .agents
            .all()
            .into_iter()
            .find(|(_, model)| model.trim().is_empty())
        {
            return Err(ConfigError::InvalidConfig(format!(
                "Model for agent '{agent}' must not be empty"
            )));
        }

        if self.pipeline.progress_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.progress_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.max_turns == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.max_turns must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.call_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "pipeline.call_timeout_secs must be greater than zero when set".to_string(),
            ));
        }

        if !(1..=20).contains(&self.search.max_results) {
            return Err(ConfigError::InvalidConfig(
                "search.max_results must be between 1 and 20".to_string(),
            ));
        }

        if self.search.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "search.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Get LLM API key from the configured environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    /// Web search settings, or `None` when the search agent runs without the tool
    pub fn web_search_config(&self) -> Result<Option<WebSearchConfig>, ConfigError> {
        if !self.search.enabled {
            return Ok(None);
        }

        let api_key = std::env::var(&self.search.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.search.api_key_env.clone()))?;
        let mut config = WebSearchConfig {
            api_key,
            max_results: self.search.max_results,
            timeout: Duration::from_secs(self.search.timeout_secs),
            ..Default::default()
        };
        if let Some(base_url) = &self.search.base_url {
            config.base_url = base_url.clone();
        }

        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ResearchConfig::from_toml_str("").unwrap();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.agents.planner, "gpt-4o");
        assert_eq!(config.agents.writer, "gpt-4.1");
        assert_eq!(config.pipeline.progress_interval(), Duration::from_secs(5));
        assert_eq!(config.pipeline.max_turns, 10);
        assert_eq!(config.pipeline.call_timeout(), None);
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[llm]
provider = "openai"
api_key_env = "MY_KEY"
base_url = "http://localhost:8080/v1"
timeout_secs = 30

[agents]
planner = "o3-mini"
search = "gpt-4o-mini"

[pipeline]
progress_interval_secs = 2
max_turns = 4
call_timeout_secs = 120
"#;

        let config = ResearchConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.llm.api_key_env, "MY_KEY");
        assert_eq!(
            config.llm.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(config.agents.planner, "o3-mini");
        assert_eq!(config.agents.search, "gpt-4o-mini");
        // Unset agents keep their defaults
        assert_eq!(config.agents.verifier, "gpt-4o");
        assert_eq!(config.pipeline.max_turns, 4);
        assert_eq!(
            config.pipeline.call_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_unsupported_provider_rejected() {
        let result = ResearchConfig::from_toml_str("[llm]\nprovider = \"mystery\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = ResearchConfig::from_toml_str("[pipeline]\nprogress_interval_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_max_turns_rejected() {
        let result = ResearchConfig::from_toml_str("[pipeline]\nmax_turns = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_model_rejected() {
        let result = ResearchConfig::from_toml_str("[agents]\nwriter = \"  \"\n");
        match result {
            Err(ConfigError::InvalidConfig(message)) => assert!(message.contains("writer")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_toml() {
        let result = ResearchConfig::from_toml_str("[pipeline\nmax_turns = ");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_search_section_defaults_and_bounds() {
        let config = ResearchConfig::from_toml_str("").unwrap();
        assert!(config.search.enabled);
        assert_eq!(config.search.api_key_env, "SERPER_API_KEY");
        assert_eq!(config.search.max_results, 10);

        let result = ResearchConfig::from_toml_str("[search]\nmax_results = 50\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_disabled_search_needs_no_key() {
        let config = ResearchConfig::from_toml_str(
            "[search]\nenabled = false\napi_key_env = \"FINRESEARCH_TEST_UNSET_SEARCH_VAR\"\n",
        )
        .unwrap();
        assert!(config.web_search_config().unwrap().is_none());
    }

    #[test]
    fn test_missing_api_key_env() {
        let config = ResearchConfig {
            llm: LlmSection {
                api_key_env: "FINRESEARCH_TEST_UNSET_KEY_VAR".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(
            config.get_llm_api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }
}
