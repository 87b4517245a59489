//! Structured command extraction
//!
//! Turns raw user text into a [`StructuredCommand`] without any I/O. Extraction runs in
//! three stages, and the first stage that produces a command wins:
//!
//! 1. help literals ("help", "commands", "help with commands", "show commands")
//! 2. the ordered pattern rules in [`rules`] (create, list, analyze, search, schedule,
//!    read, delete)
//! 3. the free-form extractor in [`freeform`], which needs a leading verb
//!
//! ```rust
//! use mother_agent::command::{detect, CommandType};
//!
//! let command = detect("create script hello with content: console.log('hi')").unwrap();
//! assert_eq!(command.command_type, CommandType::Create);
//! assert_eq!(command.param("filename"), Some("hello.js"));
//! ```

pub mod freeform;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Literal phrases that always mean "show the help payload"
pub const HELP_SYNONYMS: [&str; 4] = ["help", "commands", "help with commands", "show commands"];

/// Kinds of structured commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Create,
    List,
    Analyze,
    Search,
    Schedule,
    Read,
    Delete,
    Help,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Create => "create",
            CommandType::List => "list",
            CommandType::Analyze => "analyze",
            CommandType::Search => "search",
            CommandType::Schedule => "schedule",
            CommandType::Read => "read",
            CommandType::Delete => "delete",
            CommandType::Help => "help",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(CommandType::Create),
            "list" => Ok(CommandType::List),
            "analyze" => Ok(CommandType::Analyze),
            "search" => Ok(CommandType::Search),
            "schedule" => Ok(CommandType::Schedule),
            "read" => Ok(CommandType::Read),
            "delete" => Ok(CommandType::Delete),
            "help" => Ok(CommandType::Help),
            other => Err(format!("Unknown command type: {other}")),
        }
    }
}

/// A machine-parsed command extracted from free text
///
/// Parameters are fixed at extraction time. The only later change allowed is filling
/// `content` from a referenced stored file, see [`StructuredCommand::resolve_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCommand {
    #[serde(rename = "commandType")]
    pub command_type: CommandType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    params: BTreeMap<String, String>,
}

impl StructuredCommand {
    /// Build a command; parameter keys are lower-cased
    pub fn new(
        command_type: CommandType,
        action: Option<String>,
        params: BTreeMap<String, String>,
    ) -> Self {
        let params = params
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            command_type,
            action,
            params,
        }
    }

    pub fn help() -> Self {
        Self::new(CommandType::Help, None, BTreeMap::new())
    }

    pub fn is_help(&self) -> bool {
        self.command_type == CommandType::Help
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Fill `content` from a side lookup; an existing value is never overwritten
    pub fn resolve_content(&mut self, content: String) -> bool {
        if self.params.contains_key("content") {
            return false;
        }
        self.params.insert("content".to_string(), content);
        true
    }

    /// Compact JSON form used in prompts and responses
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Check the trimmed, case-insensitive text against the help literals
pub fn is_help_request(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    HELP_SYNONYMS.iter().any(|s| *s == normalized)
}

/// Extract a structured command from raw text
///
/// Returns `None` when no rule matches and the text has no recognised leading verb.
pub fn detect(text: &str) -> Option<StructuredCommand> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_help_request(trimmed) {
        return Some(StructuredCommand::help());
    }

    rules::match_rules(trimmed).or_else(|| freeform::extract(trimmed))
}
