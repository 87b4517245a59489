//! Configuration system for the coordinator
//!
//! Configuration is a TOML document with `[coordinator]`, `[llm]`, `[storage]` and
//! `[memory]` sections plus any number of `[[agents]]` entries. Every section except
//! `[llm]` has defaults. API keys are never stored in the file; `llm.api_key_env` names
//! the environment variable that holds the key.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub memory: MemorySection,
    /// Additional or overriding handler descriptors
    #[serde(default)]
    pub agents: Vec<AgentSection>,
}

/// Coordinator identity and prompt-context settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorSection {
    /// Coordinator identifier (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_coordinator_id")]
    pub id: String,
    /// Number of history entries included in generative prompts
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Conversation key used when a request does not name one
    #[serde(default = "default_conversation")]
    pub default_conversation: String,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            id: default_coordinator_id(),
            history_window: default_history_window(),
            default_conversation: default_conversation(),
        }
    }
}

fn default_coordinator_id() -> String {
    crate::agent::registry::ids::COORDINATOR.to_string()
}

pub(crate) fn default_history_window() -> usize {
    10
}

pub(crate) fn default_conversation() -> String {
    "default".to_string()
}

/// Generative backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (currently "openai", any OpenAI-compatible endpoint via base_url)
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Override for the provider base URL
    pub base_url: Option<String>,
    /// Temperature for free-form responses
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Temperature for delegation decisions
    #[serde(default = "default_delegation_temperature")]
    pub delegation_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound for a single backend call, retries included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub(crate) fn default_temperature() -> f32 {
    0.7
}

pub(crate) fn default_delegation_temperature() -> f32 {
    0.1
}

pub(crate) fn default_max_tokens() -> u32 {
    1000
}

pub(crate) fn default_timeout_secs() -> u64 {
    30
}

/// File store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/files")
}

fn default_max_file_size() -> usize {
    1024 * 1024
}

/// Conversation history settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySection {
    /// Maximum stored entries per conversation key
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    100
}

/// A handler descriptor declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
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
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check identifiers and numeric bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent_id(&self.coordinator.id)?;

        let mut seen = HashSet::new();
        for agent in &self.agents {
            validate_agent_id(&agent.id)?;
            if !seen.insert(agent.id.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Duplicate agent id '{}' in [[agents]]",
                    agent.id
                )));
            }
        }

        if self.memory.max_entries == 0 {
            return Err(ConfigError::InvalidConfig(
                "memory.max_entries must be greater than zero".to_string(),
            ));
        }

        if self.coordinator.history_window > self.memory.max_entries {
            return Err(ConfigError::InvalidConfig(format!(
                "coordinator.history_window ({}) exceeds memory.max_entries ({})",
                self.coordinator.history_window, self.memory.max_entries
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature)
            || !(0.0..=2.0).contains(&self.llm.delegation_temperature)
        {
            return Err(ConfigError::InvalidConfig(
                "llm temperatures must be between 0.0 and 2.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate agent ID format
fn validate_agent_id(agent_id: &str) -> Result<(), ConfigError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if agent_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentId(format!(
            "Agent ID '{agent_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
