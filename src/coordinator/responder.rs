//! Generative responses
//!
//! Used when the coordinator answers directly, when a handler has no deterministic
//! behavior for a command, and as the best-effort answer after a dispatch failure. When
//! the backend itself fails the reply is simulated locally.

use crate::agent::{CapabilityRegistry, HandlerDescriptor};
use crate::command::StructuredCommand;
use crate::error::{CoordinatorError, Recovered};
use crate::llm::provider::{CompletionRequest, LlmProvider, Message};
use crate::llm::{complete_with_timeout, reply_text, GenerationSettings};
use crate::memory::{format_history, HistoryEntry};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Everything a generative reply is grounded on
pub struct ReplyContext<'a> {
    pub raw_command: &'a str,
    pub command: Option<&'a StructuredCommand>,
    pub history: &'a [HistoryEntry],
    pub extracted_context: &'a Map<String, Value>,
}

impl ReplyContext<'_> {
    fn render(&self) -> String {
        let structured = self
            .command
            .map(|c| c.to_json().to_string())
            .unwrap_or_else(|| "none".to_string());
        let context = if self.extracted_context.is_empty() {
            "none".to_string()
        } else {
            Value::Object(self.extracted_context.clone()).to_string()
        };

        format!(
            "RECENT CONVERSATION:\n{}\n\nUSER COMMAND:\n{}\n\nSTRUCTURED COMMAND:\n{}\n\nEXTRACTED CONTEXT:\n{}",
            format_history(self.history),
            self.raw_command,
            structured,
            context
        )
    }
}

pub struct Responder {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl Responder {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    fn coordinator_system_prompt(registry: &CapabilityRegistry) -> String {
        let coordinator = registry.coordinator();
        format!(
            "You are {} ({}), the coordination agent of a multi-agent system. {}.\n\
             Answer the user directly and concisely. When another agent is better suited, say which one and how to ask it.\n\n{}",
            coordinator.name,
            coordinator.id,
            coordinator.description,
            registry.capability_listing()
        )
    }

    fn handler_system_prompt(handler: &HandlerDescriptor) -> String {
        format!(
            "You are {} ({}). {}.\nYour capabilities: {}.\n\
             Stay within these capabilities. If the request falls outside them, say so briefly.",
            handler.name,
            handler.id,
            handler.description,
            handler.capabilities.join(", ")
        )
    }

    /// Coordinator answers the command itself
    pub async fn coordinator_reply(
        &self,
        registry: &CapabilityRegistry,
        ctx: &ReplyContext<'_>,
    ) -> Recovered<String> {
        let system = Self::coordinator_system_prompt(registry);
        self.generate(registry.coordinator(), system, ctx).await
    }

    /// A handler answers through its generative path
    pub async fn handler_reply(
        &self,
        handler: &HandlerDescriptor,
        ctx: &ReplyContext<'_>,
    ) -> Recovered<String> {
        let system = Self::handler_system_prompt(handler);
        self.generate(handler, system, ctx).await
    }

    async fn generate(
        &self,
        handler: &HandlerDescriptor,
        system: String,
        ctx: &ReplyContext<'_>,
    ) -> Recovered<String> {
        let request = CompletionRequest {
            messages: vec![Message::system(system), Message::user(ctx.render())],
            model: self.settings.model.clone(),
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            response_format: None,
            metadata: HashMap::from([
                ("purpose".to_string(), "response".to_string()),
                ("handler_id".to_string(), handler.id.clone()),
            ]),
        };

        match complete_with_timeout(self.provider.as_ref(), request, self.settings.timeout)
            .await
            .and_then(reply_text)
        {
            Ok(text) => Recovered::clean(text),
            Err(e) => {
                warn!(handler_id = %handler.id, error = %e, "Generative response failed, simulating");
                Recovered::degraded(
                    simulated_reply(handler, ctx.raw_command),
                    CoordinatorError::from(e),
                )
            }
        }
    }
}

/// Local stand-in used when the backend cannot be reached
pub fn simulated_reply(handler: &HandlerDescriptor, raw_command: &str) -> String {
    format!(
        "[{}] The generative backend is unavailable, so this is a simulated response. \
         Your request \"{}\" was received. I can help with: {}. Try one of the structured commands (type \"help\") or retry later.",
        handler.name,
        raw_command.trim(),
        handler.capabilities.join(", ")
    )
}
