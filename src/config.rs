//! Configuration system for quizchain
//!
//! The TOML file names the environment variables that hold secrets; the secrets
//! themselves are resolved at startup and handed to component constructors.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuizConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub renderer: RendererSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
}

/// Inbound HTTP entry point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Listen port
    pub port: u16,
    /// Environment variable holding the shared secret callers must present
    pub secret_env: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8080,
            secret_env: "QUIZ_SECRET".to_string(),
        }
    }
}

/// Page rendering backend (Browserless-compatible)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererSection {
    pub base_url: String,
    /// Environment variable containing the rendering API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            base_url: "https://chrome.browserless.io".to_string(),
            api_key_env: "BROWSERLESS_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Reasoning backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    /// Provider name; only "openai" (any OpenAI-compatible endpoint) is supported
    pub provider: String,
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// System prompt
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.aipipe.org/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "PIPE_API_KEY".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
            max_tokens: 1500,
            timeout_secs: 60,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise data-analysis assistant. \
Return ONLY the final answer. No explanations. If number, return only the number. \
If boolean, return true/false. If JSON, return only valid JSON. Do not include markdown.";

/// Step loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowSection {
    /// Submission-response field that carries the next quiz page URL
    pub continuation_field: String,
    /// Answer submitted for fixed-answer demonstration pages
    pub demo_answer: String,
    /// Ask the reasoner to summarise each page before dispatching
    pub interpret_instructions: bool,
    pub submit_timeout_secs: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            continuation_field: "nextUrl".to_string(),
            demo_answer: "anything you want".to_string(),
            interpret_instructions: false,
            submit_timeout_secs: 30,
        }
    }
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

impl QuizConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: QuizConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.workflow.continuation_field.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "workflow.continuation_field must not be empty".to_string(),
            ));
        }

        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidConfig(format!(
                "llm.temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: &str) -> Option<String> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.is_empty())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        Self::get_env_var_optional(env_var_name)
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the entry-point shared secret from environment variable
    pub fn get_server_secret(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.server.secret_env)
    }

    /// Get rendering backend API key from environment variable
    pub fn get_renderer_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.renderer.api_key_env)
    }

    /// Get LLM API key; absence is allowed and degrades answers to error strings
    pub fn get_llm_api_key(&self) -> Option<String> {
        Self::get_env_var_optional(&self.llm.api_key_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[server]
port = 9000
secret_env = "MY_SECRET"

[renderer]
base_url = "http://localhost:3000"
api_key_env = "RENDER_KEY"
timeout_secs = 10

[llm]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
system_prompt = "Answer tersely."
temperature = 0.2
max_tokens = 200

[workflow]
continuation_field = "url"
demo_answer = "hello"
interpret_instructions = true
"#;

        let config = QuizConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.renderer.base_url, "http://localhost:3000");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_tokens, 200);
        assert_eq!(config.workflow.continuation_field, "url");
        assert!(config.workflow.interpret_instructions);
        // Unset fields keep their defaults
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.workflow.submit_timeout_secs, 30);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = QuizConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuizConfig::default());
        assert_eq!(config.workflow.continuation_field, "nextUrl");
        assert_eq!(config.llm.api_key_env, "PIPE_API_KEY");
        assert_eq!(config.renderer.api_key_env, "BROWSERLESS_KEY");
        assert!(!config.workflow.interpret_instructions);
    }

    #[test]
    fn test_unsupported_provider_rejected() {
        let result = QuizConfig::from_toml_str("[llm]\nprovider = \"anthropic\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_continuation_field_rejected() {
        let result = QuizConfig::from_toml_str("[workflow]\ncontinuation_field = \" \"\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let result = QuizConfig::from_toml_str("[llm]\ntemperature = 3.5\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_port_rejected() {
        let result = QuizConfig::from_toml_str("[server]\nport = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_env_var_reported_by_name() {
        let mut config = QuizConfig::default();
        config.renderer.api_key_env = "QUIZCHAIN_TEST_UNSET_RENDER_KEY".to_string();

        match config.get_renderer_api_key() {
            Err(ConfigError::EnvVarNotFound(name)) => {
                assert_eq!(name, "QUIZCHAIN_TEST_UNSET_RENDER_KEY")
            }
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_llm_key_is_none() {
        let mut config = QuizConfig::default();
        config.llm.api_key_env = "QUIZCHAIN_TEST_UNSET_LLM_KEY".to_string();
        assert_eq!(config.get_llm_api_key(), None);
    }
}
