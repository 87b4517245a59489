//! Generative backend layer
//!
//! A provider-agnostic completion interface plus the OpenAI-compatible HTTP client.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;

use crate::config::LlmSection;
use std::time::Duration;

/// Model parameters shared by every generative call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub delegation_temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        use crate::config::{
            default_delegation_temperature, default_max_tokens, default_temperature,
            default_timeout_secs,
        };

        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: default_temperature(),
            delegation_temperature: default_delegation_temperature(),
            max_tokens: default_max_tokens(),
            timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}

impl From<&LlmSection> for GenerationSettings {
    fn from(section: &LlmSection) -> Self {
        Self {
            model: section.model.clone(),
            temperature: section.temperature,
            delegation_temperature: section.delegation_temperature,
            max_tokens: section.max_tokens,
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

/// Run one completion under a deadline; an elapsed deadline is [`LlmError::Timeout`]
pub async fn complete_with_timeout(
    provider: &dyn LlmProvider,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<CompletionResponse, LlmError> {
    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout)),
    }
}

/// Non-empty reply text, or `InvalidResponse`
pub fn reply_text(response: CompletionResponse) -> Result<String, LlmError> {
    response
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))
}
