//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation and error handling,
//! including wiring a coordinator from a loaded file.


use mother_agent::config::{ConfigError, CoordinatorConfig};
use mother_agent::coordinator::{CommandRequest, Coordinator};
use mother_agent::observability::NoopMetrics;
use mother_agent::testing::MockLlmProvider;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[coordinator]
id = "mother-agent"
history_window = 4

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
delegation_temperature = 0.0

[storage]
root = "/var/lib/mother/files"

[[agents]]
id = "research-agent"
name = "Research Agent"
description = "Finds sources"
capabilities = ["research"]
"#,
    );

    let config = CoordinatorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.coordinator.history_window, 4);
    assert_eq!(config.llm.delegation_temperature, 0.0);
    assert_eq!(config.storage.root, PathBuf::from("/var/lib/mother/files"));
    assert_eq!(config.agents[0].id, "research-agent");
}

#[test]
fn test_minimal_config_applies_defaults() {
    let config = test_helpers::test_config();

    assert_eq!(config.coordinator.id, "mother-agent");
    assert_eq!(config.coordinator.default_conversation, "default");
    assert_eq!(config.llm.base_url, None);
    assert_eq!(config.memory.max_entries, 100);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = CoordinatorConfig::load_from_file(std::path::Path::new("/nonexistent/mother.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let temp_file = write_config("[llm\nprovider = ");
    let result = CoordinatorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_agent_id_rejected() {
    let temp_file = write_config(
        r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[[agents]]
id = "bad agent!"
name = "Bad"
description = "spaces are not allowed"
"#,
    );

    let result = CoordinatorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidAgentId(_))));
}

#[test]
fn test_out_of_range_temperature_rejected() {
    let temp_file = write_config(
        r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 3.5
"#,
    );

    let result = CoordinatorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = test_helpers::test_config();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = CoordinatorConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(config, reparsed);
}

#[tokio::test]
async fn test_coordinator_from_config_uses_local_store_and_agents() {
    let dir = TempDir::new().unwrap();
    let toml_content = format!(
        r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[storage]
root = "{}"

[[agents]]
id = "research-agent"
name = "Research Agent"
description = "Finds sources"
"#,
        dir.path().join("files").display()
    );
    let config = CoordinatorConfig::from_toml_str(&toml_content).unwrap();

    let coordinator = Coordinator::from_config(
        &config,
        Arc::new(MockLlmProvider::new(vec![])),
        Arc::new(NoopMetrics),
    )
    .unwrap();
    assert!(coordinator.registry().find("research-agent").is_some());

    let response = coordinator
        .handle(CommandRequest::new("create file todo with content: buy milk"))
        .await
        .unwrap();

    assert!(response.response.starts_with("Created file 'todo.txt'"));
    let saved = std::fs::read_to_string(dir.path().join("files").join("todo.txt")).unwrap();
    assert_eq!(saved, "buy milk");
}

#[test]
fn test_unknown_coordinator_id_fails_wiring() {
    let mut config = test_helpers::test_config();
    config.coordinator.id = "not-registered".to_string();

    let result = Coordinator::from_config(
        &config,
        Arc::new(MockLlmProvider::new(vec![])),
        Arc::new(NoopMetrics),
    );
    assert!(result.is_err());
}
