//! Capability registry
//!
//! Static list of handler descriptors, built once at startup from the built-in handlers
//! plus any `[[agents]]` configuration entries. Shared read-only behind an `Arc`.

use crate::config::AgentSection;
use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Identifiers of the built-in handlers
pub mod ids {
    pub const COORDINATOR: &str = "mother-agent";
    pub const SCRIPT: &str = "script-agent";
    pub const FILE: &str = "file-agent";
    pub const DATA: &str = "data-agent";
    pub const TEXT: &str = "text-agent";
    pub const DECISION: &str = "decision-agent";
}

/// Describes one handler and what it can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

impl HandlerDescriptor {
    pub fn new(id: &str, name: &str, description: &str, capabilities: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Case-insensitive capability check
    pub fn can_handle(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }
}

impl From<&AgentSection> for HandlerDescriptor {
    fn from(section: &AgentSection) -> Self {
        Self {
            id: section.id.clone(),
            name: section.name.clone(),
            description: section.description.clone(),
            capabilities: section.capabilities.clone(),
        }
    }
}

/// Built-in handler set
pub fn builtin_handlers() -> Vec<HandlerDescriptor> {
    vec![
        HandlerDescriptor::new(
            ids::COORDINATOR,
            "Mother Agent",
            "Coordinates the other agents, answers general questions and explains what the system can do",
            &["coordination", "delegation", "general-questions", "help"],
        ),
        HandlerDescriptor::new(
            ids::SCRIPT,
            "Script Agent",
            "Writes scripts and code files and manages stored scripts",
            &["create-scripts", "code-generation", "read-files", "list-files", "delete-files"],
        ),
        HandlerDescriptor::new(
            ids::FILE,
            "File Agent",
            "Creates, reads, lists and deletes stored files and documents",
            &["create-files", "read-files", "list-files", "delete-files"],
        ),
        HandlerDescriptor::new(
            ids::DATA,
            "Data Agent",
            "Analyzes JSON, tabular data, text and code and reports on their structure",
            &["analyze-json", "analyze-data", "analyze-text", "analyze-code", "statistics"],
        ),
        HandlerDescriptor::new(
            ids::TEXT,
            "Text Agent",
            "Searches, summarizes and writes text",
            &["search", "summarize", "write", "translate"],
        ),
        HandlerDescriptor::new(
            ids::DECISION,
            "Decision Agent",
            "Schedules events, plans work and weighs options",
            &["schedule", "planning", "decision-making", "prioritization"],
        ),
    ]
}

/// Read-only registry of handler descriptors
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    handlers: Vec<HandlerDescriptor>,
    coordinator_id: String,
}

impl CapabilityRegistry {
    /// Registry holding only the built-in handlers
    pub fn builtin() -> Self {
        Self {
            handlers: builtin_handlers(),
            coordinator_id: ids::COORDINATOR.to_string(),
        }
    }

    /// Built-in handlers merged with configured ones; a configured id replaces the
    /// built-in descriptor with the same id, new ids are appended in declaration order
    pub fn from_config(coordinator_id: &str, agents: &[AgentSection]) -> CoordinatorResult<Self> {
        let mut handlers = builtin_handlers();

        for section in agents {
            let descriptor = HandlerDescriptor::from(section);
            match handlers.iter_mut().find(|h| h.id == descriptor.id) {
                Some(existing) => {
                    debug!(handler_id = %descriptor.id, "Overriding built-in handler descriptor");
                    *existing = descriptor;
                }
                None => {
                    debug!(handler_id = %descriptor.id, "Registering configured handler");
                    handlers.push(descriptor);
                }
            }
        }

        if !handlers.iter().any(|h| h.id == coordinator_id) {
            return Err(CoordinatorError::not_found(coordinator_id));
        }

        info!(handlers = handlers.len(), coordinator = %coordinator_id, "Capability registry loaded");

        Ok(Self {
            handlers,
            coordinator_id: coordinator_id.to_string(),
        })
    }

    pub fn list(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    pub fn find(&self, id: &str) -> Option<&HandlerDescriptor> {
        self.handlers.iter().find(|h| h.id == id)
    }

    /// Like [`find`](Self::find), but an unknown id is a NotFound error
    pub fn require(&self, id: &str) -> CoordinatorResult<&HandlerDescriptor> {
        self.find(id).ok_or_else(|| CoordinatorError::not_found(id))
    }

    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    pub fn is_coordinator(&self, id: &str) -> bool {
        id == self.coordinator_id
    }

    pub fn coordinator(&self) -> &HandlerDescriptor {
        // from_config and builtin both guarantee the coordinator is present
        self.find(&self.coordinator_id)
            .unwrap_or(&self.handlers[0])
    }

    /// Text listing of every handler, embedded in generative prompts
    pub fn capability_listing(&self) -> String {
        let mut output = String::from("AVAILABLE AGENTS:\n");
        for handler in &self.handlers {
            let capabilities = if handler.capabilities.is_empty() {
                "none".to_string()
            } else {
                handler.capabilities.join(", ")
            };
            output.push_str(&format!(
                "- {} ({}): {} [capabilities: {}]\n",
                handler.id, handler.name, handler.description, capabilities
            ));
        }
        output
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
