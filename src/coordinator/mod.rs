//! The coordinator ("mother agent")
//!
//! Every command goes through the same phases:
//!
//! ```text
//! Received -> Extracted -> Delegated -> Dispatched -> Responded
//! ```
//!
//! Only an empty command or an unknown explicit handler id fails the request. Backend
//! failures, unusable delegation replies and store errors are recovered: the response
//! still arrives, with the recovered errors listed in it.

pub mod help;
pub mod responder;

use crate::agent::CapabilityRegistry;
use crate::command::{self, CommandType, StructuredCommand};
use crate::config::CoordinatorConfig;
use crate::dispatch::{HandlerDispatch, RequestContext};
use crate::error::{sanitize_error_message, CoordinatorError, CoordinatorResult, Recovered};
use crate::llm::provider::LlmProvider;
use crate::llm::GenerationSettings;
use crate::memory::{HistoryEntry, HistoryStore, InMemoryHistory};
use crate::observability::metrics::{MetricEvent, MetricsSink, Phase};
use crate::routing::{direct_decision, DelegationDecision, DelegationSource, GenerativeDelegator};
use crate::storage::{FileStore, FileStoreError, LocalFileStore};
use responder::{ReplyContext, Responder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Incoming command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Skip delegation and send the command to this handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Phase durations in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timings {
    pub extraction_ms: u64,
    pub delegation_ms: u64,
    pub response_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub request_id: Uuid,
    pub conversation_id: String,
    pub response: String,
    /// Responding handler id; empty when the coordinator answered
    pub delegated_agent: String,
    pub reason: String,
    pub delegation_source: DelegationSource,
    pub structured_command: Option<StructuredCommand>,
    pub context: Map<String, Value>,
    pub timings: Timings,
    pub recovered_errors: Vec<String>,
}

/// Pipeline phases, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Extracted,
    Delegated,
    Dispatched,
    Responded,
    /// Absorbing: no transition leaves it
    Error,
}

struct PhaseTracker {
    phase: RequestPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        debug!(phase = ?RequestPhase::Received, "Command received");
        Self {
            phase: RequestPhase::Received,
        }
    }

    fn advance(&mut self, next: RequestPhase) {
        if self.phase == RequestPhase::Error {
            return;
        }
        debug!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
    }

    fn fail(&mut self, error: &CoordinatorError) {
        warn!(from = ?self.phase, error = %error, "Command failed");
        self.phase = RequestPhase::Error;
    }
}

/// Coordinator knobs that are not part of generation
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorOptions {
    pub generation: GenerationSettings,
    pub history_window: usize,
    pub default_conversation: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            history_window: crate::config::default_history_window(),
            default_conversation: crate::config::default_conversation(),
        }
    }
}

impl From<&CoordinatorConfig> for CoordinatorOptions {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            generation: GenerationSettings::from(&config.llm),
            history_window: config.coordinator.history_window,
            default_conversation: config.coordinator.default_conversation.clone(),
        }
    }
}

/// Collected recoveries for one request
#[derive(Default)]
struct Recoveries {
    errors: Vec<CoordinatorError>,
}

impl Recoveries {
    fn take<T>(&mut self, recovered: Recovered<T>) -> T {
        if let Some(error) = recovered.recovered {
            self.errors.push(error);
        }
        recovered.value
    }

    fn push(&mut self, error: CoordinatorError) {
        self.errors.push(error);
    }
}

pub struct Coordinator {
    registry: Arc<CapabilityRegistry>,
    dispatch: HandlerDispatch,
    delegator: GenerativeDelegator,
    responder: Responder,
    history: Arc<dyn HistoryStore>,
    metrics: Arc<dyn MetricsSink>,
    options: CoordinatorOptions,
}

impl Coordinator {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn FileStore>,
        history: Arc<dyn HistoryStore>,
        metrics: Arc<dyn MetricsSink>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            registry,
            dispatch: HandlerDispatch::new(store),
            delegator: GenerativeDelegator::new(Arc::clone(&provider), options.generation.clone()),
            responder: Responder::new(provider, options.generation.clone()),
            history,
            metrics,
            options,
        }
    }

    /// Wire up the local file store and in-memory history described by the configuration
    pub fn from_config(
        config: &CoordinatorConfig,
        provider: Arc<dyn LlmProvider>,
        metrics: Arc<dyn MetricsSink>,
    ) -> CoordinatorResult<Self> {
        config.validate()?;
        let registry = CapabilityRegistry::from_config(&config.coordinator.id, &config.agents)?;
        let store = LocalFileStore::new(config.storage.root.clone(), config.storage.max_file_size);
        let history = InMemoryHistory::new(config.memory.max_entries);

        Ok(Self::new(
            Arc::new(registry),
            provider,
            Arc::new(store),
            Arc::new(history),
            metrics,
            CoordinatorOptions::from(config),
        ))
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Handle one command end to end
    pub async fn handle(&self, request: CommandRequest) -> CoordinatorResult<CommandResponse> {
        let request_id = Uuid::new_v4();
        let conversation_id = request
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.options.default_conversation)
            .to_string();

        let span = crate::command_span!(
            request_id = %request_id,
            conversation_id = %conversation_id
        );

        self.process(request_id, conversation_id, request)
            .instrument(span)
            .await
    }

    fn reject(&self, tracker: &mut PhaseTracker, error: CoordinatorError) -> CoordinatorError {
        tracker.fail(&error);
        self.metrics.record(MetricEvent::CommandRejected {
            reason: error.to_string(),
        });
        error
    }

    fn phase_done(&self, phase: Phase, started: Instant) -> Duration {
        let duration = started.elapsed();
        self.metrics
            .record(MetricEvent::PhaseCompleted { phase, duration });
        duration
    }

    async fn process(
        &self,
        request_id: Uuid,
        conversation_id: String,
        request: CommandRequest,
    ) -> CoordinatorResult<CommandResponse> {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();
        let mut recoveries = Recoveries::default();
        self.metrics.record(MetricEvent::CommandReceived);

        let raw = request.command.trim().to_string();
        if raw.is_empty() {
            return Err(self.reject(
                &mut tracker,
                CoordinatorError::validation("command must not be empty"),
            ));
        }

        let explicit_agent = request
            .agent_id
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        if let Some(agent_id) = explicit_agent {
            if let Err(e) = self.registry.require(agent_id) {
                return Err(self.reject(&mut tracker, e));
            }
        }

        // Extraction
        let extraction_started = Instant::now();
        let mut structured = command::detect(&raw);
        let extraction = self.phase_done(Phase::Extraction, extraction_started);
        tracker.advance(RequestPhase::Extracted);
        debug!(
            command_type = structured.as_ref().map(|c| c.command_type.as_str()).unwrap_or("none"),
            "Command extracted"
        );

        if structured.as_ref().is_some_and(StructuredCommand::is_help) {
            let decision = DelegationDecision::to_coordinator(
                "help requested",
                DelegationSource::DirectMapping,
            );
            let reply = help::help_payload(&self.registry);
            tracker.advance(RequestPhase::Responded);
            return Ok(self
                .finish(
                    request_id,
                    conversation_id,
                    &raw,
                    reply,
                    decision,
                    structured,
                    Timings {
                        extraction_ms: extraction.as_millis() as u64,
                        ..Default::default()
                    },
                    started,
                    recoveries,
                )
                .await);
        }

        let history = self
            .history
            .recent(&conversation_id, self.options.history_window)
            .await;

        // Delegation
        let delegation_started = Instant::now();
        let decision = match explicit_agent {
            Some(agent_id) => self.explicit_decision(agent_id, structured.as_ref()),
            None => match structured.as_ref().and_then(direct_decision) {
                Some(decision) => decision,
                None => recoveries.take(
                    self.delegator
                        .delegate(&self.registry, &history, &raw, structured.as_ref())
                        .await,
                ),
            },
        };
        let delegation = self.phase_done(Phase::Delegation, delegation_started);
        self.metrics.record(MetricEvent::Delegated {
            handler_id: decision.delegated_agent().to_string(),
            direct: decision.source.is_direct(),
        });
        tracker.advance(RequestPhase::Delegated);
        info!(
            target_handler = %decision.delegated_agent(),
            source = ?decision.source,
            reason = %decision.reason,
            "Command delegated"
        );

        // Dispatch and response
        let response_started = Instant::now();
        if let Some(command) = structured.as_mut() {
            if let Err(e) = self.resolve_analysis_content(command).await {
                recoveries.push(e);
            }
        }

        let ctx = RequestContext {
            request_id,
            conversation_id: conversation_id.clone(),
        };
        let reply = self
            .respond(&decision, structured.as_ref(), &raw, &history, &ctx, &mut recoveries)
            .await;
        tracker.advance(RequestPhase::Dispatched);
        let response_phase = self.phase_done(Phase::Response, response_started);
        tracker.advance(RequestPhase::Responded);

        Ok(self
            .finish(
                request_id,
                conversation_id,
                &raw,
                reply,
                decision,
                structured,
                Timings {
                    extraction_ms: extraction.as_millis() as u64,
                    delegation_ms: delegation.as_millis() as u64,
                    response_ms: response_phase.as_millis() as u64,
                    total_ms: 0,
                },
                started,
                recoveries,
            )
            .await)
    }

    fn explicit_decision(
        &self,
        agent_id: &str,
        command: Option<&StructuredCommand>,
    ) -> DelegationDecision {
        let reason = format!("explicitly addressed to {agent_id}");
        let mut decision = if self.registry.is_coordinator(agent_id) {
            DelegationDecision::to_coordinator(reason, DelegationSource::Explicit)
        } else {
            DelegationDecision::to_handler(agent_id, reason, DelegationSource::Explicit)
        };
        if let Some(command) = command {
            decision.extracted_context = command
                .params()
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
        }
        decision
    }

    /// `analyze` naming a stored file gets the file's content before dispatch
    async fn resolve_analysis_content(
        &self,
        command: &mut StructuredCommand,
    ) -> CoordinatorResult<()> {
        if command.command_type != CommandType::Analyze || command.param("content").is_some() {
            return Ok(());
        }
        let Some(filename) = command.param("filename").map(str::to_string) else {
            return Ok(());
        };

        match self.dispatch.store().read(&filename).await {
            Ok(content) => {
                debug!(file = %filename, bytes = content.len(), "Resolved analysis content");
                command.resolve_content(content);
                Ok(())
            }
            // Reported by the data handler
            Err(FileStoreError::NotFound(_)) => Ok(()),
            Err(e) => {
                warn!(file = %filename, error = %e, "Could not resolve analysis content");
                Err(CoordinatorError::Storage(e))
            }
        }
    }

    async fn respond(
        &self,
        decision: &DelegationDecision,
        command: Option<&StructuredCommand>,
        raw: &str,
        history: &[HistoryEntry],
        ctx: &RequestContext,
        recoveries: &mut Recoveries,
    ) -> String {
        let reply_ctx = ReplyContext {
            raw_command: raw,
            command,
            history,
            extracted_context: &decision.extracted_context,
        };

        let Some(handler_id) = decision.target_handler_id.as_deref() else {
            return recoveries.take(
                self.responder
                    .coordinator_reply(&self.registry, &reply_ctx)
                    .await,
            );
        };

        let Some(handler) = self.registry.find(handler_id) else {
            // Decisions only name registered handlers
            return recoveries.take(
                self.responder
                    .coordinator_reply(&self.registry, &reply_ctx)
                    .await,
            );
        };

        if let Some(command) = command {
            match self.dispatch.apply(command, handler_id, ctx).await {
                Ok(Some(message)) => {
                    self.metrics.record(MetricEvent::DispatchHit {
                        handler_id: handler_id.to_string(),
                        command_type: command.command_type.to_string(),
                    });
                    return message;
                }
                Ok(None) => {
                    let miss =
                        CoordinatorError::dispatch_miss(handler_id, command.command_type.as_str());
                    debug!(reason = %miss, "Dispatch miss, using generative path");
                    self.metrics.record(MetricEvent::DispatchMiss {
                        handler_id: handler_id.to_string(),
                        command_type: command.command_type.to_string(),
                        reason: miss.to_string(),
                    });
                }
                Err(e) => {
                    warn!(handler_id, error = %e, "Dispatch failed, answering generatively");
                    recoveries.push(CoordinatorError::from(e));
                }
            }
        }

        recoveries.take(self.responder.handler_reply(handler, &reply_ctx).await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        request_id: Uuid,
        conversation_id: String,
        raw: &str,
        reply: String,
        decision: DelegationDecision,
        structured: Option<StructuredCommand>,
        mut timings: Timings,
        started: Instant,
        recoveries: Recoveries,
    ) -> CommandResponse {
        let responder_id = decision
            .target_handler_id
            .clone()
            .unwrap_or_else(|| self.registry.coordinator_id().to_string());

        self.history
            .append_exchange(
                &conversation_id,
                HistoryEntry::user(raw),
                HistoryEntry::handler(responder_id.clone(), reply.clone()),
            )
            .await;

        let recovered_errors: Vec<String> = recoveries
            .errors
            .iter()
            .map(|e| sanitize_error_message(&e.to_string()))
            .collect();
        for message in &recovered_errors {
            self.metrics.record(MetricEvent::ErrorRecovered {
                handler_id: responder_id.clone(),
                message: message.clone(),
            });
        }

        let total = started.elapsed();
        timings.total_ms = total.as_millis() as u64;
        self.metrics.record(MetricEvent::CommandCompleted {
            handler_id: responder_id,
            duration: total,
        });

        info!(
            delegated_agent = %decision.delegated_agent(),
            total_ms = timings.total_ms,
            recovered = recovered_errors.len(),
            "Command completed"
        );

        CommandResponse {
            request_id,
            conversation_id,
            response: reply,
            delegated_agent: decision.delegated_agent().to_string(),
            reason: decision.reason,
            delegation_source: decision.source,
            structured_command: structured,
            context: decision.extracted_context,
            timings,
            recovered_errors,
        }
    }
}
