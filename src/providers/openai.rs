//! OpenAI-shape adapter: chat completions and embeddings over the
//! `/v1/chat/completions` and `/v1/embeddings` REST surface.
//!
//! Grounded on `src/core/providers/openai/{provider,client,error}.rs` in the reference
//! gateway — header construction, the validate-then-transform-then-send shape, and the
//! HTTP-status→error mapping all follow that file's structure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::providers::{run_cancellable, LlmProvider};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelCapability,
    ModelDescriptor, ProviderConfig, ResponseFormat, Role, Usage,
};
use crate::validation::{validate_chat_request, validate_embedding_request};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";

#[derive(Debug)]
pub struct OpenAiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
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

    fn auth_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }

    fn transform_chat_request(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let mut value = serde_json::json!({ "role": m.role.as_str(), "content": m.content });
                if let Some(name) = &m.name {
                    value["name"] = Value::String(name.clone());
                }
                value
            })
            .collect();

        let mut body = serde_json::json!({ "model": request.model, "messages": messages });
        if let Some(v) = request.max_tokens {
            body["max_tokens"] = Value::from(v);
        }
        if let Some(v) = request.temperature {
            body["temperature"] = Value::from(v);
        }
        if let Some(v) = request.top_p {
            body["top_p"] = Value::from(v);
        }
        if let Some(v) = &request.stop {
            body["stop"] = Value::from(v.clone());
        }
        if let Some(v) = request.presence_penalty {
            body["presence_penalty"] = Value::from(v);
        }
        if let Some(v) = request.frequency_penalty {
            body["frequency_penalty"] = Value::from(v);
        }
        if let Some(format) = &request.response_format {
            let type_str = match format {
                ResponseFormat::Text => "text",
                ResponseFormat::JsonObject { .. } => "json_object",
            };
            body["response_format"] = serde_json::json!({ "type": type_str });
        }
        if let Some(v) = &request.user {
            body["user"] = Value::String(v.clone());
        }
        body
    }

    async fn send(&self, url: String, body: Value) -> Result<Value, ProviderError> {
        let request = self.auth_headers(self.client.post(&url).json(&body));
        let response = request.send().await.map_err(transport_error)?;

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

        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("failed to parse response body: {e}")))
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
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Map an HTTP error response to a [`ProviderError`], following the status→sentinel
/// table in SPEC_FULL §4.3. Falls back to status + raw body when the error body does
/// not parse as OpenAI's `{error: {message, code}}` shape.
fn map_error_response(status: reqwest::StatusCode, body: &[u8], retry_after: Option<u64>) -> ProviderError {
    let parsed: Option<OpenAiErrorBody> = serde_json::from_slice(body).ok();
    let (message, code) = match &parsed {
        Some(err) => (err.error.message.clone(), err.error.code.clone()),
        None => (String::from_utf8_lossy(body).to_string(), None),
    };

    let mut provider_error = match status.as_u16() {
        401 | 403 => ProviderError::invalid_api_key(PROVIDER, message),
        429 => ProviderError::rate_limit(PROVIDER, message),
        408 | 504 => ProviderError::provider_timeout(PROVIDER, message),
        s if s >= 500 => ProviderError::provider_unavailable(PROVIDER, message),
        _ if code.as_deref() == Some("context_length_exceeded") => {
            ProviderError::context_too_long(PROVIDER, message)
        }
        _ => ProviderError::invalid_response(PROVIDER, message),
    }
    .with_http_status(status.as_u16());

    if let Some(code) = code {
        provider_error = provider_error.with_code(code);
    }
    if let Some(seconds) = retry_after {
        provider_error = provider_error.with_retry_after(seconds);
    }
    provider_error
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionResponse {
    id: String,
    model: String,
    choices: Vec<Choice>,
    usage: OpenAiUsage,
}

#[derive(Debug, Serialize, Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingsResponse {
    model: String,
    data: Vec<EmbeddingItem>,
    usage: EmbeddingUsage,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
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
        let url = format!("{}/v1/chat/completions", self.base_url());
        let value = run_cancellable(PROVIDER, cancel, self.send(url, body)).await??;

        let parsed: ChatCompletionResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("malformed chat response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "response contained no choices"))?;

        let role = Role::parse(&choice.message.role).unwrap_or(Role::Assistant);

        Ok(ChatResponse {
            id: parsed.id,
            model: parsed.model,
            message: ChatMessage::new(role, choice.message.content),
            finish_reason: choice.finish_reason,
            usage: Usage {
                prompt_tokens: parsed.usage.prompt_tokens,
                completion_tokens: parsed.usage.completion_tokens,
                total_tokens: parsed.usage.total_tokens,
            },
        })
    }

    async fn generate_embeddings(
        &self,
        cancel: &CancellationToken,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        validate_embedding_request(PROVIDER, &request)?;

        let body = serde_json::json!({ "model": request.model, "input": request.input });
        let url = format!("{}/v1/embeddings", self.base_url());
        let value = run_cancellable(PROVIDER, cancel, self.send(url, body)).await??;

        let parsed: EmbeddingsResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("malformed embeddings response: {e}")))?;

        // Reassemble by `index`, not by arrival order (SPEC_FULL §5 ordering guarantee).
        let mut embeddings = vec![Vec::new(); request.input.len()];
        for item in parsed.data {
            if item.index < embeddings.len() {
                embeddings[item.index] = item.embedding;
            }
        }

        Ok(EmbeddingResponse {
            model: parsed.model,
            embeddings,
            prompt_tokens: parsed.usage.prompt_tokens,
            total_tokens: parsed.usage.total_tokens,
        })
    }

    fn list_models(&self) -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor {
                id: "gpt-4o".into(),
                display_name: "GPT-4o".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 16_384,
                context_window: 128_000,
                input_cost_per_million: 2.50,
                output_cost_per_million: 10.00,
                capabilities: vec![
                    ModelCapability::Chat,
                    ModelCapability::Vision,
                    ModelCapability::FunctionCalling,
                    ModelCapability::JsonMode,
                ],
            },
            ModelDescriptor {
                id: "gpt-3.5-turbo".into(),
                display_name: "GPT-3.5 Turbo".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 4_096,
                context_window: 16_385,
                input_cost_per_million: 0.50,
                output_cost_per_million: 1.50,
                capabilities: vec![ModelCapability::Chat, ModelCapability::FunctionCalling],
            },
            ModelDescriptor {
                id: "text-embedding-3-small".into(),
                display_name: "Text Embedding 3 Small".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 0,
                context_window: 8_191,
                input_cost_per_million: 0.02,
                output_cost_per_million: 0.0,
                capabilities: vec![ModelCapability::Embedding],
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

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let config = ProviderConfig::builder().api_key("sk-test").base_url(server.uri()).build();
        OpenAiProvider::new(config)
    }

    #[tokio::test]
    async fn happy_path_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-123",
                "model": "gpt-4",
                "choices": [{
                    "message": {"role": "assistant", "content": "Hello! How can I help you?"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("Hello")]);
        let response = provider.chat_completion(&CancellationToken::new(), request).await.unwrap();

        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.message.content, "Hello! How can I help you?");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage, Usage { prompt_tokens: 10, completion_tokens: 8, total_tokens: 18 });
    }

    #[tokio::test]
    async fn rate_limit_maps_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "30")
                    .set_body_json(json!({"error": {"message": "slow down", "type": "rate_limit_error"}})),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("Hello")]);
        let err = provider.chat_completion(&CancellationToken::new(), request).await.unwrap_err();

        assert!(err.is_rate_limit());
        assert_eq!(err.http_status, 429);
        assert_eq!(err.retry_after, Some(30));
    }

    #[tokio::test]
    async fn canceled_token_aborts_before_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)).set_body_json(json!({})))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("Hello")]);
        let err = provider.chat_completion(&cancel, request).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Canceled);
    }

    #[tokio::test]
    async fn embeddings_reassemble_by_index_not_arrival_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "text-embedding-3-small",
                "data": [
                    {"embedding": [0.2], "index": 1},
                    {"embedding": [0.1], "index": 0}
                ],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let request = EmbeddingRequest::new("text-embedding-3-small", vec!["a".into(), "b".into()]);
        let response = provider.generate_embeddings(&CancellationToken::new(), request).await.unwrap();

        assert_eq!(response.embeddings, vec![vec![0.1], vec![0.2]]);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_network() {
        // No mock is registered; wiremock fails the test if the server receives a call
        // it was not told to expect, which verifies validation is total.
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        let request = ChatRequest::new("", vec![]);
        let err = provider.chat_completion(&CancellationToken::new(), request).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidModel);
    }
}
