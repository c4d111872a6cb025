//! Anthropic Messages API adapter.
//!
//! Grounded on `src/core/providers/anthropic/provider.rs` in the reference gateway: the
//! system-message-hoisting step, the `x-api-key` + `anthropic-version` header pair, and
//! the content-block concatenation on the way back all follow that file's shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::providers::{run_cancellable, LlmProvider};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelCapability,
    ModelDescriptor, ProviderConfig, Role, Usage,
};
use crate::validation::validate_chat_request;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const PROVIDER: &str = "anthropic";

#[derive(Debug)]
pub struct AnthropicProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Split a [`ChatRequest`]'s messages into Anthropic's `(system, messages)` shape:
    /// system messages are hoisted into a single top-level field, never sent inline.
    fn transform_chat_request(&self, request: &ChatRequest) -> Value {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                Role::System => system_parts.push(message.content.clone()),
                Role::User | Role::Assistant => {
                    messages.push(serde_json::json!({
                        "role": message.role.as_str(),
                        "content": message.content,
                    }));
                }
            }
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(v) = request.temperature {
            body["temperature"] = Value::from(v);
        }
        if let Some(v) = request.top_p {
            body["top_p"] = Value::from(v);
        }
        if let Some(v) = &request.stop {
            body["stop_sequences"] = Value::from(v.clone());
        }
        body
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::provider_timeout(PROVIDER, err.to_string())
    } else {
        ProviderError::provider_unavailable(PROVIDER, err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Map an HTTP error response, following the status/type→sentinel table in SPEC_FULL
/// §4.3: `overloaded_error` and 503 both mean "provider unavailable", context-length
/// failures are detected by substring since Anthropic has no dedicated error code for it.
fn map_error_response(status: reqwest::StatusCode, body: &[u8], retry_after: Option<u64>) -> ProviderError {
    let parsed: Option<AnthropicErrorBody> = serde_json::from_slice(body).ok();
    let (message, error_type) = match &parsed {
        Some(err) => (err.error.message.clone(), Some(err.error.error_type.clone())),
        None => (String::from_utf8_lossy(body).to_string(), None),
    };

    let lower = message.to_lowercase();
    let looks_like_context_overflow = lower.contains("maximum") && lower.contains("token");

    let mut provider_error = match error_type.as_deref() {
        Some("authentication_error") => ProviderError::invalid_api_key(PROVIDER, message.clone()),
        Some("permission_error") => ProviderError::unauthorized(PROVIDER, message.clone()),
        Some("rate_limit_error") => ProviderError::rate_limit(PROVIDER, message.clone()),
        Some("overloaded_error") => ProviderError::provider_unavailable(PROVIDER, message.clone()),
        _ if looks_like_context_overflow => ProviderError::context_too_long(PROVIDER, message.clone()),
        _ => match status.as_u16() {
            401 => ProviderError::invalid_api_key(PROVIDER, message.clone()),
            403 => ProviderError::unauthorized(PROVIDER, message.clone()),
            429 => ProviderError::rate_limit(PROVIDER, message.clone()),
            408 | 504 => ProviderError::provider_timeout(PROVIDER, message.clone()),
            s if s >= 500 => ProviderError::provider_unavailable(PROVIDER, message.clone()),
            _ => ProviderError::invalid_response(PROVIDER, message.clone()),
        },
    }
    .with_http_status(status.as_u16());

    if let Some(error_type) = error_type {
        provider_error = provider_error.with_code(error_type);
    }
    if let Some(seconds) = retry_after {
        provider_error = provider_error.with_retry_after(seconds);
    }
    provider_error
}

#[derive(Debug, Serialize, Deserialize)]
struct MessagesResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat_completion(
        &self,
        cancel: &CancellationToken,
        request: ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        validate_chat_request(PROVIDER, &request)?;

        let body = self.transform_chat_request(&request);
        let url = format!("{}/v1/messages", self.base_url());

        let mut builder = self.client.post(&url).header("anthropic-version", ANTHROPIC_VERSION).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = run_cancellable(PROVIDER, cancel, builder.send()).await?.map_err(transport_error)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let bytes = response.bytes().await.map_err(transport_error)?;

        if status.as_u16() >= 400 {
            return Err(map_error_response(status, &bytes, retry_after));
        }

        let parsed: MessagesResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("malformed messages response: {e}")))?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            id: parsed.id,
            model: parsed.model,
            message: ChatMessage::assistant(content),
            finish_reason: parsed.stop_reason.unwrap_or_else(|| "stop".to_string()),
            usage: Usage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }

    async fn generate_embeddings(
        &self,
        _cancel: &CancellationToken,
        _request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::unsupported_operation(PROVIDER, "generate_embeddings"))
    }

    fn list_models(&self) -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor {
                id: "claude-3-5-sonnet-20241022".into(),
                display_name: "Claude 3.5 Sonnet".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 8_192,
                context_window: 200_000,
                input_cost_per_million: 3.00,
                output_cost_per_million: 15.00,
                capabilities: vec![ModelCapability::Chat, ModelCapability::Vision, ModelCapability::FunctionCalling],
            },
            ModelDescriptor {
                id: "claude-3-haiku-20240307".into(),
                display_name: "Claude 3 Haiku".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 4_096,
                context_window: 200_000,
                input_cost_per_million: 0.25,
                output_cost_per_million: 1.25,
                capabilities: vec![ModelCapability::Chat, ModelCapability::Vision],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        let config = ProviderConfig::builder().api_key("sk-ant-test").base_url(server.uri()).build();
        AnthropicProvider::new(config)
    }

    #[tokio::test]
    async fn hoists_system_messages_and_concatenates_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_01",
                "model": "claude-3-5-sonnet-20241022",
                "content": [{"type": "text", "text": "Hello"}, {"type": "text", "text": " there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new(
            "claude-3-5-sonnet-20241022",
            vec![ChatMessage::system("Be terse."), ChatMessage::user("Hi")],
        );
        let response = provider.chat_completion(&CancellationToken::new(), request).await.unwrap();

        assert_eq!(response.message.content, "Hello there");
        assert_eq!(response.finish_reason, "end_turn");
    }

    #[tokio::test]
    async fn embeddings_are_unsupported() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        let err = provider
            .generate_embeddings(&CancellationToken::new(), EmbeddingRequest::new("claude-3-5-sonnet-20241022", vec!["a".into()]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::UnsupportedOperation);
    }

    #[tokio::test]
    async fn overloaded_error_is_retryable_provider_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("claude-3-5-sonnet-20241022", vec![ChatMessage::user("hi")]);
        let err = provider.chat_completion(&CancellationToken::new(), request).await.unwrap_err();

        assert_eq!(err.kind, crate::error::ErrorKind::ProviderUnavailable);
        assert!(err.is_retryable());
    }
}
