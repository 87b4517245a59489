//! Delegation decisions
//!
//! A command is routed by, in order of precedence: an explicit handler id on the request,
//! the direct command-type mapping, then one generative call. Whatever the backend says,
//! an id that is not registered (or is the coordinator's own) resolves to the coordinator.

use super::parse::{parse_reply, ParseTier};
use super::schema::DelegationOutput;
use crate::agent::{ids, CapabilityRegistry};
use crate::command::{CommandType, StructuredCommand};
use crate::error::{sanitize_error_message, CoordinatorError, Recovered};
use crate::llm::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmError, LlmProvider, Message, ResponseFormat,
};
use crate::llm::{complete_with_timeout, reply_text, GenerationSettings};
use crate::memory::{format_history, HistoryEntry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reason used when the backend reply carried nothing usable
pub const DEFAULT_REASON: &str = "handling directly as coordination agent";

/// How a delegation decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationSource {
    /// The request named a handler
    Explicit,
    /// Command-type mapping, no backend call
    DirectMapping,
    /// Strictly parsed backend reply
    Generative,
    /// Backend reply recovered field by field
    PermissiveParse,
    /// Backend reply unusable
    Default,
    /// Backend call failed
    UpstreamFailure,
}

impl DelegationSource {
    pub fn is_direct(&self) -> bool {
        matches!(self, DelegationSource::Explicit | DelegationSource::DirectMapping)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegationDecision {
    /// `None` means the coordinator answers itself
    pub target_handler_id: Option<String>,
    pub reason: String,
    pub extracted_context: Map<String, Value>,
    pub source: DelegationSource,
}

impl DelegationDecision {
    pub fn to_handler(
        handler_id: impl Into<String>,
        reason: impl Into<String>,
        source: DelegationSource,
    ) -> Self {
        Self {
            target_handler_id: Some(handler_id.into()),
            reason: reason.into(),
            extracted_context: Map::new(),
            source,
        }
    }

    pub fn to_coordinator(reason: impl Into<String>, source: DelegationSource) -> Self {
        Self {
            target_handler_id: None,
            reason: reason.into(),
            extracted_context: Map::new(),
            source,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.target_handler_id.is_none()
    }

    /// Handler id as reported to callers; empty for the coordinator
    pub fn delegated_agent(&self) -> &str {
        self.target_handler_id.as_deref().unwrap_or("")
    }
}

/// Handler for command types that never need a generative decision
///
/// `list` is deliberately absent: it maps to the coordinator, which delegates generatively.
pub fn direct_target(command_type: CommandType) -> Option<&'static str> {
    match command_type {
        CommandType::Create => Some(ids::SCRIPT),
        CommandType::Analyze => Some(ids::DATA),
        CommandType::Search => Some(ids::TEXT),
        CommandType::Schedule => Some(ids::DECISION),
        _ => None,
    }
}

/// Decision for a structured command with a direct mapping
pub fn direct_decision(command: &StructuredCommand) -> Option<DelegationDecision> {
    direct_target(command.command_type).map(|handler_id| {
        let mut decision = DelegationDecision::to_handler(
            handler_id,
            format!("'{}' commands are handled by {handler_id}", command.command_type),
            DelegationSource::DirectMapping,
        );
        decision.extracted_context = params_as_context(command);
        decision
    })
}

fn params_as_context(command: &StructuredCommand) -> Map<String, Value> {
    command
        .params()
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// Backend error text for the decision reason, without a doubled "API error" prefix
fn upstream_detail(error: &LlmError) -> String {
    match error {
        LlmError::ApiError(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Asks the generative backend which handler should take a command
pub struct GenerativeDelegator {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl GenerativeDelegator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    fn build_prompt(
        registry: &CapabilityRegistry,
        history: &[HistoryEntry],
        raw_command: &str,
        command: Option<&StructuredCommand>,
    ) -> String {
        let structured = command
            .map(|c| c.to_json().to_string())
            .unwrap_or_else(|| "none".to_string());

        format!(
            r#"Decide which agent should handle the user's command.

{listing}
RECENT CONVERSATION:
{history}

USER COMMAND:
{raw_command}

STRUCTURED COMMAND:
{structured}

Reply with a single JSON object and nothing else:
{{"agent": "<agent id>" or null, "reason": "<one sentence>", "contextInfo": {{<facts the agent needs>}}}}

Use null for "agent" when {coordinator} should answer directly (general questions, conversation, anything no other agent covers)."#,
            listing = registry.capability_listing(),
            history = format_history(history),
            coordinator = registry.coordinator_id(),
        )
    }

    fn build_request(&self, prompt: String) -> CompletionRequest {
        let mut request = CompletionRequest {
            messages: vec![
                Message::system(
                    "You are the coordination agent of a multi-agent system. You route each user command to the single best agent.",
                ),
                Message::user(prompt),
            ],
            model: self.settings.model.clone(),
            max_tokens: Some(300),
            temperature: Some(self.settings.delegation_temperature),
            response_format: None,
            metadata: HashMap::from([("purpose".to_string(), "delegation".to_string())]),
        };

        if self.provider.name() == "openai" {
            request.response_format = Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: "delegation_decision".to_string(),
                    strict: Some(false),
                    schema: DelegationOutput::json_schema(),
                },
            });
        }

        request
    }

    /// Map a parsed reply onto a registered handler
    fn resolve(
        registry: &CapabilityRegistry,
        output: &DelegationOutput,
        source: DelegationSource,
    ) -> DelegationDecision {
        let reason = if output.reason.trim().is_empty() {
            DEFAULT_REASON.to_string()
        } else {
            output.reason.trim().to_string()
        };

        let mut decision = match output.agent_id() {
            Some(id) if registry.is_coordinator(id) => {
                DelegationDecision::to_coordinator(reason, source)
            }
            Some(id) if registry.find(id).is_some() => {
                DelegationDecision::to_handler(id, reason, source)
            }
            Some(id) => {
                warn!(agent = %id, "Backend chose an unregistered agent, coordinator takes over");
                DelegationDecision::to_coordinator(reason, source)
            }
            None => DelegationDecision::to_coordinator(reason, source),
        };
        decision.extracted_context = output.context_object();
        decision
    }

    /// One generative call; failures degrade to a coordinator decision
    pub async fn delegate(
        &self,
        registry: &CapabilityRegistry,
        history: &[HistoryEntry],
        raw_command: &str,
        command: Option<&StructuredCommand>,
    ) -> Recovered<DelegationDecision> {
        let prompt = Self::build_prompt(registry, history, raw_command, command);
        let request = self.build_request(prompt);

        let reply = match complete_with_timeout(self.provider.as_ref(), request, self.settings.timeout)
            .await
            .and_then(reply_text)
        {
            Ok(reply) => reply,
            Err(e) => {
                let detail = sanitize_error_message(&upstream_detail(&e));
                warn!(error = %detail, "Delegation call failed");
                return Recovered::degraded(
                    DelegationDecision::to_coordinator(
                        format!("API error: {detail}"),
                        DelegationSource::UpstreamFailure,
                    ),
                    CoordinatorError::from(e),
                );
            }
        };

        match parse_reply(&reply) {
            Some(parsed) => {
                let source = match parsed.tier {
                    ParseTier::Strict => DelegationSource::Generative,
                    ParseTier::Permissive => DelegationSource::PermissiveParse,
                };
                let decision = Self::resolve(registry, &parsed.output, source);
                info!(
                    target_handler = %decision.delegated_agent(),
                    source = ?decision.source,
                    "Delegation decided"
                );
                Recovered::clean(decision)
            }
            None => {
                debug!(reply_len = reply.len(), "Delegation reply not recognised");
                Recovered::degraded(
                    DelegationDecision::to_coordinator(DEFAULT_REASON, DelegationSource::Default),
                    CoordinatorError::malformed_reply(format!(
                        "no delegation fields in reply: {}",
                        sanitize_error_message(&reply)
                    )),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::detect;
    use crate::testing::mocks::MockLlmProvider;
    use std::time::Duration;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "mock-model".to_string(),
            temperature: 0.7,
            delegation_temperature: 0.1,
            max_tokens: 200,
            timeout: Duration::from_secs(5),
        }
    }

    fn delegator(mock: &MockLlmProvider) -> GenerativeDelegator {
        GenerativeDelegator::new(Arc::new(mock.clone()), settings())
    }

    #[test]
    fn test_direct_mapping() {
        assert_eq!(direct_target(CommandType::Create), Some(ids::SCRIPT));
        assert_eq!(direct_target(CommandType::Analyze), Some(ids::DATA));
        assert_eq!(direct_target(CommandType::Search), Some(ids::TEXT));
        assert_eq!(direct_target(CommandType::Schedule), Some(ids::DECISION));
        assert_eq!(direct_target(CommandType::List), None);
        assert_eq!(direct_target(CommandType::Read), None);
        assert_eq!(direct_target(CommandType::Delete), None);
    }

    #[test]
    fn test_direct_decision_carries_params() {
        let command = detect("search for rust tutorials in docs").unwrap();
        let decision = direct_decision(&command).unwrap();
        assert_eq!(decision.delegated_agent(), ids::TEXT);
        assert_eq!(decision.source, DelegationSource::DirectMapping);
        assert_eq!(decision.extracted_context["source"], "docs");
    }

    #[test]
    fn test_coordinator_decision_reports_empty_agent() {
        let decision = DelegationDecision::to_coordinator("x", DelegationSource::Default);
        assert!(decision.is_coordinator());
        assert_eq!(decision.delegated_agent(), "");
    }

    #[tokio::test]
    async fn test_generative_delegation() {
        let mock = MockLlmProvider::single_response(
            r#"{"agent":"file-agent","reason":"file read","contextInfo":{"filename":"notes.txt"}}"#,
        );
        let registry = CapabilityRegistry::builtin();
        let command = detect("read notes.txt").unwrap();

        let result = delegator(&mock)
            .delegate(&registry, &[], "read notes.txt", Some(&command))
            .await;

        assert!(!result.is_recovered());
        assert_eq!(result.value.delegated_agent(), ids::FILE);
        assert_eq!(result.value.source, DelegationSource::Generative);
        assert_eq!(result.value.extracted_context["filename"], "notes.txt");
    }

    #[tokio::test]
    async fn test_prompt_carries_registry_history_and_command() {
        let mock = MockLlmProvider::single_response(r#"{"agent":null,"reason":"chat"}"#);
        let registry = CapabilityRegistry::builtin();
        let history = vec![HistoryEntry::user("earlier question")];
        let command = detect("list files").unwrap();

        delegator(&mock)
            .delegate(&registry, &history, "list files", Some(&command))
            .await;

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("AVAILABLE AGENTS:"));
        assert!(prompt.contains(ids::DECISION));
        assert!(prompt.contains("user: earlier question"));
        assert!(prompt.contains("list files"));
        assert!(prompt.contains(r#""commandType":"list""#));
        assert_eq!(requests[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_unknown_or_self_agent_resolves_to_coordinator() {
        let registry = CapabilityRegistry::builtin();
        for reply in [
            r#"{"agent":"ghost-agent","reason":"?"}"#,
            r#"{"agent":"mother-agent","reason":"mine"}"#,
        ] {
            let mock = MockLlmProvider::single_response(reply);
            let result = delegator(&mock).delegate(&registry, &[], "hi", None).await;
            assert!(result.value.is_coordinator(), "reply: {reply}");
            assert!(!result.is_recovered());
        }
    }

    #[tokio::test]
    async fn test_permissive_source() {
        let mock = MockLlmProvider::single_response("agent: 'data-agent', reason: 'numbers'");
        let registry = CapabilityRegistry::builtin();
        let result = delegator(&mock).delegate(&registry, &[], "crunch", None).await;
        assert_eq!(result.value.delegated_agent(), ids::DATA);
        assert_eq!(result.value.source, DelegationSource::PermissiveParse);
    }

    #[tokio::test]
    async fn test_unusable_reply_defaults() {
        let mock = MockLlmProvider::single_response("I'm not sure, maybe someone else?");
        let registry = CapabilityRegistry::builtin();
        let result = delegator(&mock).delegate(&registry, &[], "hmm", None).await;

        assert!(result.value.is_coordinator());
        assert_eq!(result.value.reason, DEFAULT_REASON);
        assert_eq!(result.value.source, DelegationSource::Default);
        assert!(matches!(
            result.recovered,
            Some(CoordinatorError::MalformedUpstreamReply { .. })
        ));
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let mock = MockLlmProvider::with_failure();
        let registry = CapabilityRegistry::builtin();
        let result = delegator(&mock).delegate(&registry, &[], "hello", None).await;

        assert_eq!(result.value.delegated_agent(), "");
        assert!(result.value.reason.starts_with("API error: "));
        assert!(result.value.reason.contains("503"));
        assert!(!result.value.reason.contains("API error: API error"));
        assert_eq!(result.value.source, DelegationSource::UpstreamFailure);
        assert!(matches!(
            result.recovered,
            Some(CoordinatorError::Upstream { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_failure() {
        let mock = MockLlmProvider::single_response("{}").with_delay(Duration::from_millis(200));
        let mut settings = settings();
        settings.timeout = Duration::from_millis(20);
        let delegator = GenerativeDelegator::new(Arc::new(mock), settings);

        let result = delegator
            .delegate(&CapabilityRegistry::builtin(), &[], "slow", None)
            .await;
        assert_eq!(result.value.source, DelegationSource::UpstreamFailure);
        assert!(result.value.reason.contains("Timed out"));
    }
}
