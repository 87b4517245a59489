//! OpenAI-compatible chat completions client
//!
//! Works against api.openai.com or any server exposing the same `/chat/completions`
//! contract (set `base_url`). Server errors and network failures are retried with a short
//! backoff; client errors (4xx) fail immediately.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole, ResponseFormat, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

const BACKOFF_DELAYS_MS: [u64; 3] = [100, 200, 300];

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Convert completion request to wire format (pure function)
    fn convert_to_openai_request(request: &CompletionRequest) -> OpenAiCompletionRequest {
        let response_format = request.response_format.as_ref().map(|rf| match rf {
            ResponseFormat::Text => OpenAiResponseFormat::Simple {
                format_type: "text".to_string(),
            },
            ResponseFormat::Json => OpenAiResponseFormat::Simple {
                format_type: "json_object".to_string(),
            },
            ResponseFormat::JsonSchema { json_schema } => OpenAiResponseFormat::JsonSchema {
                format_type: "json_schema".to_string(),
                json_schema: OpenAiJsonSchema {
                    name: json_schema.name.clone(),
                    strict: json_schema.strict,
                    schema: json_schema.schema.clone(),
                },
            },
        });

        OpenAiCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format,
        }
    }

    fn convert_message(message: &Message) -> OpenAiMessage {
        OpenAiMessage {
            role: match message.role {
                MessageRole::System => "system".to_string(),
                MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: Some(message.content.clone()),
        }
    }

    /// Parse completion response (pure function)
    fn parse_completion_response(
        openai_response: OpenAiCompletionResponse,
        metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices returned from backend".to_string())
        })?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content,
            model: openai_response.model,
            usage,
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
            metadata,
        })
    }

    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    /// Server errors and transport failures are worth another attempt
    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) => true,
            LlmError::ApiError(msg) => msg.contains("server error"),
            _ => false,
        }
    }

    async fn complete_with_retry(
        &self,
        openai_request: OpenAiCompletionRequest,
        metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(BACKOFF_DELAYS_MS.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!(attempt, delay_ms, "Retrying generative backend request");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(&openai_request).await {
                Ok(openai_response) => {
                    let response = Self::parse_completion_response(openai_response, metadata)?;
                    debug!(
                        total_tokens = response.usage.total_tokens,
                        finish_reason = ?response.finish_reason,
                        retries = attempt,
                        "Generative backend request succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Generative backend request failed");
                    if !Self::should_retry(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("Generative backend request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    async fn make_api_request(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<OpenAiCompletionResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(openai_request)
            .send()
            .await
            .map_err(|e| {
                LlmError::NetworkError(format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ))
            })?;

        let status = response.status();

        if status.is_server_error() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "server error: {status} - {}",
                extract_error_message(&error_text)
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthenticationFailed(
                "Backend rejected the API key".to_string(),
            ));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "{status} - {}",
                extract_error_message(&error_text)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// Pull `error.message` out of a backend error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<OpenAiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let openai_request = Self::convert_to_openai_request(&request);
        debug!(
            messages = openai_request.messages.len(),
            model = %openai_request.model,
            "Sending generative backend request"
        );
        self.complete_with_retry(openai_request, request.metadata)
            .await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::AuthenticationFailed(format!(
                "Health check returned {}",
                response.status()
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAiResponseFormat {
    Simple {
        #[serde(rename = "type")]
        format_type: String,
    },
    JsonSchema {
        #[serde(rename = "type")]
        format_type: String,
        json_schema: OpenAiJsonSchema,
    },
}

#[derive(Debug, Serialize)]
struct OpenAiJsonSchema {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
    schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("You coordinate."), Message::user("Hello")],
            model: "gpt-4o-mini".to_string(),
            max_tokens: Some(100),
            temperature: Some(0.7),
            response_format: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_openai_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_provider_requires_api_key() {
        let result = OpenAiProvider::new(OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));

        let config = OpenAiConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_request_serialization() {
        let wire = OpenAiProvider::convert_to_openai_request(&request());
        let json = serde_json::to_string(&wire).unwrap();

        assert!(json.contains("\"model\":\"gpt-4o-mini\""));
        assert!(json.contains("\"max_tokens\":100"));
        assert!(json.contains("\"temperature\":0.7"));
        assert!(json.contains("\"role\":\"system\""));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_json_response_format_serialization() {
        let mut req = request();
        req.response_format = Some(ResponseFormat::Json);
        let json = serde_json::to_string(&OpenAiProvider::convert_to_openai_request(&req)).unwrap();
        assert!(json.contains("\"response_format\":{\"type\":\"json_object\"}"));
    }

    #[test]
    fn test_finish_reason_conversion() {
        assert!(matches!(
            OpenAiProvider::convert_finish_reason(Some("stop")),
            FinishReason::Stop
        ));
        assert!(matches!(
            OpenAiProvider::convert_finish_reason(Some("length")),
            FinishReason::Length
        ));
        assert!(matches!(
            OpenAiProvider::convert_finish_reason(None),
            FinishReason::Error
        ));
    }

    #[test]
    fn test_parse_empty_choices_is_invalid() {
        let response = OpenAiCompletionResponse {
            model: "gpt-4o-mini".to_string(),
            choices: vec![],
            usage: None,
        };
        let result = OpenAiProvider::parse_completion_response(response, HashMap::new());
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_should_retry() {
        assert!(OpenAiProvider::should_retry(&LlmError::NetworkError(
            "reset".to_string()
        )));
        assert!(OpenAiProvider::should_retry(&LlmError::ApiError(
            "server error: 503".to_string()
        )));
        assert!(!OpenAiProvider::should_retry(&LlmError::ApiError(
            "400 Bad Request - bad".to_string()
        )));
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
        assert_eq!(extract_error_message(body), "model overloaded");
        assert_eq!(extract_error_message("plain text"), "plain text");
    }
}
