//! Conversation history
//!
//! Append-only log of user commands and handler responses, keyed by conversation id.

pub mod history;

pub use history::InMemoryHistory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on entries kept per conversation
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Handler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_id: Option<String>,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            handler_id: None,
        }
    }

    pub fn handler(handler_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Handler,
            content: content.into(),
            timestamp: Utc::now(),
            handler_id: Some(handler_id.into()),
        }
    }

    /// One-line rendering used inside generative prompts
    pub fn to_prompt_line(&self) -> String {
        match (&self.role, &self.handler_id) {
            (HistoryRole::User, _) => format!("user: {}", self.content),
            (HistoryRole::Handler, Some(id)) => format!("{id}: {}", self.content),
            (HistoryRole::Handler, None) => format!("assistant: {}", self.content),
        }
    }
}

/// Conversation history store
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append an entry; the oldest entries are evicted past the store's cap
    async fn append(&self, key: &str, entry: HistoryEntry);

    /// Append a command and its reply as one unit, so concurrent exchanges on the same
    /// key never interleave
    async fn append_exchange(&self, key: &str, user: HistoryEntry, handler: HistoryEntry);

    /// Up to `limit` most recent entries, oldest first
    async fn recent(&self, key: &str, limit: usize) -> Vec<HistoryEntry>;
}

/// Render a history window as prompt text
pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "(no previous messages)".to_string();
    }
    entries
        .iter()
        .map(HistoryEntry::to_prompt_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lines() {
        assert_eq!(HistoryEntry::user("hi").to_prompt_line(), "user: hi");
        assert_eq!(
            HistoryEntry::handler("data-agent", "3 keys").to_prompt_line(),
            "data-agent: 3 keys"
        );
    }

    #[test]
    fn test_format_history() {
        assert_eq!(format_history(&[]), "(no previous messages)");
        let entries = vec![HistoryEntry::user("a"), HistoryEntry::handler("x", "b")];
        assert_eq!(format_history(&entries), "user: a\nx: b");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_value(HistoryEntry::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("handler_id").is_none());
    }
}
