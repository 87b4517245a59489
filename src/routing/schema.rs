//! Structured output schema for delegation replies
//!
//! The backend is asked for `{"agent": string|null, "reason": string, "contextInfo": {...}}`.
//! OpenAI-compatible providers receive the schema through `response_format`; everything
//! else only sees the shape described in the prompt.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delegation reply from the generative backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DelegationOutput {
    /// Handler id to delegate to, or null to let the coordinator answer directly
    #[serde(default)]
    pub agent: Option<String>,

    /// Short explanation of the choice
    #[serde(default)]
    pub reason: String,

    /// Facts pulled out of the command for the chosen handler
    #[serde(
        rename = "contextInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub context_info: Option<Value>,
}

impl DelegationOutput {
    /// `contextInfo` as an object; anything else becomes an empty map
    pub fn context_object(&self) -> Map<String, Value> {
        match &self.context_info {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Trimmed agent id, treating blank strings and "null" as absent
    pub fn agent_id(&self) -> Option<&str> {
        self.agent
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("null"))
    }

    /// JSON schema used for OpenAI structured output
    pub fn json_schema() -> Value {
        let schema = schemars::schema_for!(DelegationOutput);
        serde_json::to_value(schema).unwrap_or_default()
    }
}
