//! Mother Agent - command line entry point

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use mother_agent::config::CoordinatorConfig;
use mother_agent::coordinator::{CommandRequest, Coordinator};
use mother_agent::llm::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};
use mother_agent::observability::{init_default_logging, MetricsCollector};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Routes free-text commands to specialized agents
#[derive(Parser)]
#[command(name = "mother-agent")]
#[command(about = "Command detection and delegation for a set of specialized agents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a single command and print the JSON response
    Ask {
        /// The command text
        command: String,
        /// Conversation id for history
        #[arg(long)]
        conversation: Option<String>,
        /// Send the command straight to this agent
        #[arg(long)]
        agent: Option<String>,
    },
    /// Read commands from stdin, one per line
    Repl {
        /// Conversation id for history
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Validate configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// List registered agents
    Agents,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Ask {
            command,
            conversation,
            agent,
        } => run_ask(config, command, conversation, agent).await,
        Commands::Repl { conversation } => run_repl(config, conversation).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Agents => list_agents(config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<CoordinatorConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(CoordinatorConfig::load_from_file(path)?);
    }

    for candidate in ["mother-agent.toml", "config/mother-agent.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(CoordinatorConfig::load_from_file(&path)?);
        }
    }

    Err("no configuration file found; pass -c/--config or create mother-agent.toml".into())
}

/// Stands in for the backend when no API key is available; every call fails, so the
/// coordinator answers with simulated responses
struct UnavailableProvider {
    reason: String,
}

#[async_trait]
impl LlmProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }
}

/// Provider factory for creating generative backends from configuration
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(
        config: &CoordinatorConfig,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        use mother_agent::llm::providers::{OpenAiConfig, OpenAiProvider};

        match config.llm.provider.as_str() {
            "openai" => {
                let api_key = match config.get_llm_api_key() {
                    Ok(key) => key,
                    Err(e) => {
                        warn!("{}; responses will be simulated", e);
                        return Ok(Arc::new(UnavailableProvider {
                            reason: e.to_string(),
                        }));
                    }
                };

                let defaults = OpenAiConfig::default();
                let openai_config = OpenAiConfig {
                    api_key,
                    base_url: config.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: std::time::Duration::from_secs(config.llm.timeout_secs),
                };
                Ok(Arc::new(OpenAiProvider::new(openai_config)?))
            }
            provider => Err(format!("Unsupported LLM provider: {provider}").into()),
        }
    }
}

fn build_coordinator(
    config: &CoordinatorConfig,
    metrics: Arc<MetricsCollector>,
) -> Result<Coordinator, Box<dyn std::error::Error>> {
    let provider = LlmProviderFactory::create_provider(config)?;
    Ok(Coordinator::from_config(config, provider, metrics)?)
}

async fn run_ask(
    config: CoordinatorConfig,
    command: String,
    conversation: Option<String>,
    agent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator(&config, Arc::new(MetricsCollector::new()))?;

    let request = CommandRequest {
        command,
        conversation_id: conversation,
        agent_id: agent,
    };

    match coordinator.handle(request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            let body = e.to_error_body(Uuid::new_v4());
            println!("{}", serde_json::to_string_pretty(&body)?);
            Err(e.into())
        }
    }
}

async fn run_repl(
    config: CoordinatorConfig,
    conversation: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(MetricsCollector::new());
    let coordinator = build_coordinator(&config, Arc::clone(&metrics))?;
    let conversation =
        conversation.unwrap_or_else(|| config.coordinator.default_conversation.clone());

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!(conversation = %conversation, "REPL ready (:metrics, :quit)");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":metrics" => {
                let snapshot = serde_json::to_string_pretty(&metrics.snapshot())?;
                stdout.write_all(format!("{snapshot}\n").as_bytes()).await?;
                continue;
            }
            _ => {}
        }

        let request = CommandRequest::new(line).in_conversation(conversation.clone());
        let output = match coordinator.handle(request).await {
            Ok(response) => format!(
                "[{}] {}\n",
                display_agent(&response.delegated_agent, &coordinator),
                response.response
            ),
            Err(e) => format!("error: {e}\n"),
        };
        stdout.write_all(output.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn display_agent<'a>(delegated: &'a str, coordinator: &'a Coordinator) -> &'a str {
    if delegated.is_empty() {
        coordinator.registry().coordinator_id()
    } else {
        delegated
    }
}

fn handle_config_command(
    config: &CoordinatorConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

fn list_agents(config: CoordinatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = mother_agent::agent::CapabilityRegistry::from_config(
        &config.coordinator.id,
        &config.agents,
    )?;
    print!("{}", registry.capability_listing());
    Ok(())
}
