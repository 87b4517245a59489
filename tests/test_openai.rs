//! Integration tests for the OpenAI-compatible provider
//!
//! Tests behavioral contracts against a mock HTTP server:
//! - request shape and authentication
//! - error mapping (auth failures, client errors, server errors)
//! - retry on server errors
//! - structured delegation output end to end

use mother_agent::agent::CapabilityRegistry;
use mother_agent::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use mother_agent::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use mother_agent::llm::GenerationSettings;
use mother_agent::routing::{DelegationSource, GenerativeDelegator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn test_request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::system("You coordinate."), Message::user("Hello")],
        model: "gpt-4o-mini".to_string(),
        max_tokens: Some(100),
        temperature: Some(0.7),
        response_format: None,
        metadata: HashMap::new(),
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ],
        "usage": { "prompt_tokens": 10, "completion_tokens": 15, "total_tokens": 25 }
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there!")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(response.content.as_deref(), Some("Hi there!"));
    assert_eq!(response.usage.total_tokens, 25);
    assert!(matches!(response.finish_reason, FinishReason::Stop));
}

#[tokio::test]
async fn test_unauthorized_is_authentication_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;

    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "Invalid model", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;

    match result {
        Err(LlmError::ApiError(message)) => assert!(message.contains("Invalid model")),
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(response.content.as_deref(), Some("recovered"));
}

#[tokio::test]
async fn test_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());
}

#[tokio::test]
async fn test_delegation_over_http_uses_json_schema() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "delegation_decision" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"agent": "text-agent", "reason": "writing task", "contextInfo": {"topic": "autumn"}}"#,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let delegator = GenerativeDelegator::new(Arc::new(provider), GenerationSettings::default());
    let registry = CapabilityRegistry::builtin();

    let decision = delegator
        .delegate(&registry, &[], "write a poem about autumn", None)
        .await;

    assert!(!decision.is_recovered());
    assert_eq!(decision.value.delegated_agent(), "text-agent");
    assert_eq!(decision.value.source, DelegationSource::Generative);
    assert_eq!(decision.value.extracted_context["topic"], "autumn");
}
