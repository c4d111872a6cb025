//! AWS Bedrock adapter: model-id-prefix dispatch between the Claude and Titan wire
//! formats, with signature v4 computed in-process rather than through an AWS SDK.
//!
//! Grounded on `src/core/providers/bedrock/client.rs` (dispatch + `BaseHttpClient` +
//! `AwsAuth` shape) and `bedrock/sigv4.rs` (signing) in the reference gateway.

mod claude;
mod sigv4;
mod titan;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::providers::{run_cancellable, LlmProvider};
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelCapability, ModelDescriptor, ProviderConfig};
use crate::validation::{validate_chat_request, validate_embedding_request};
use sigv4::SigV4Signer;

const PROVIDER: &str = "bedrock";

enum ModelFamily {
    Claude,
    Titan,
}

fn model_family(model: &str) -> Result<ModelFamily, ProviderError> {
    if model.starts_with("anthropic.claude") {
        Ok(ModelFamily::Claude)
    } else if model.starts_with("amazon.titan") {
        Ok(ModelFamily::Titan)
    } else {
        Err(ProviderError::invalid_model(PROVIDER, model))
    }
}

#[derive(Debug)]
pub struct BedrockProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    fn region(&self) -> Result<&str, ProviderError> {
        self.config
            .region
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_config("bedrock requires a region"))
    }

    fn signer(&self) -> Result<SigV4Signer, ProviderError> {
        let access_key = self
            .config
            .aws_access_key_id
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_config("bedrock requires aws_access_key_id"))?;
        let secret_key = self
            .config
            .aws_secret_access_key
            .as_deref()
            .ok_or_else(|| ProviderError::invalid_config("bedrock requires aws_secret_access_key"))?;
        Ok(SigV4Signer::new(access_key, secret_key, self.region()?))
    }

    /// Sign and send a single `InvokeModel` call, returning the raw response body.
    async fn invoke(
        &self,
        model: &str,
        payload: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ProviderError> {
        let region = self.region()?;
        let host = format!("bedrock-runtime.{region}.amazonaws.com");
        let path = format!("/model/{model}/invoke");
        let url = format!("https://{host}{path}");

        let (authorization, amz_date) =
            self.signer()?.sign_request("POST", &host, &path, "application/json", &payload, Utc::now())?;

        let request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-amz-date", amz_date)
            .header("authorization", authorization)
            .body(payload)
            .send();

        let response = run_cancellable(PROVIDER, cancel, request).await?.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        if status.as_u16() >= 400 {
            return Err(classify_aws_error(status, &bytes));
        }
        Ok(bytes.to_vec())
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::provider_timeout(PROVIDER, err.to_string())
    } else {
        ProviderError::provider_unavailable(PROVIDER, err.to_string())
    }
}

/// Map a Bedrock error response, matching on the `__type`/message AWS error shape.
/// Documented as a substring-based fallback: Bedrock's runtime errors don't expose a
/// stable machine-readable taxonomy the way OpenAI's `code` field does.
fn classify_aws_error(status: reqwest::StatusCode, body: &[u8]) -> ProviderError {
    let text = String::from_utf8_lossy(body);
    let lower = text.to_lowercase();

    let mut provider_error = if lower.contains("throttlingexception") {
        ProviderError::rate_limit(PROVIDER, text.to_string())
    } else if lower.contains("accessdeniedexception") || lower.contains("unauthorizedaccess") {
        ProviderError::invalid_api_key(PROVIDER, text.to_string())
    } else if lower.contains("validationexception") && lower.contains("token") {
        ProviderError::context_too_long(PROVIDER, text.to_string())
    } else if lower.contains("serviceunavailableexception") {
        ProviderError::provider_unavailable(PROVIDER, text.to_string())
    } else {
        match status.as_u16() {
            401 | 403 => ProviderError::invalid_api_key(PROVIDER, text.to_string()),
            429 => ProviderError::rate_limit(PROVIDER, text.to_string()),
            s if s >= 500 => ProviderError::provider_unavailable(PROVIDER, text.to_string()),
            _ => ProviderError::invalid_response(PROVIDER, text.to_string()),
        }
    };
    provider_error = provider_error.with_http_status(status.as_u16());
    provider_error
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat_completion(
        &self,
        cancel: &CancellationToken,
        request: ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        validate_chat_request(PROVIDER, &request)?;
        let family = model_family(&request.model)?;

        let body = match family {
            ModelFamily::Claude => claude::build_request(&request),
            ModelFamily::Titan => titan::build_request(&request),
        };
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("failed to serialize request: {e}")))?;

        let bytes = self.invoke(&request.model, payload, cancel).await?;

        match family {
            ModelFamily::Claude => claude::parse_response(&request.model, &bytes),
            ModelFamily::Titan => titan::parse_response(&request.model, &bytes),
        }
    }

    async fn generate_embeddings(
        &self,
        cancel: &CancellationToken,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        validate_embedding_request(PROVIDER, &request)?;
        if !request.model.starts_with("amazon.titan-embed") {
            return Err(ProviderError::unsupported_operation(PROVIDER, "generate_embeddings"));
        }

        // No batch embeddings endpoint for this family: one `InvokeModel` call per text.
        let mut embeddings = Vec::with_capacity(request.input.len());
        let mut total_tokens = 0u32;
        for text in &request.input {
            let payload = serde_json::to_vec(&titan::build_embedding_request(text))
                .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("failed to serialize request: {e}")))?;
            let bytes = self.invoke(&request.model, payload, cancel).await?;
            let (embedding, tokens) = titan::parse_embedding_response(&bytes)?;
            embeddings.push(embedding);
            total_tokens += tokens;
        }

        Ok(EmbeddingResponse { model: request.model, embeddings, prompt_tokens: total_tokens, total_tokens })
    }

    fn list_models(&self) -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor {
                id: "anthropic.claude-3-5-sonnet-20241022-v2:0".into(),
                display_name: "Claude 3.5 Sonnet (Bedrock)".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 8_192,
                context_window: 200_000,
                input_cost_per_million: 3.00,
                output_cost_per_million: 15.00,
                capabilities: vec![ModelCapability::Chat],
            },
            ModelDescriptor {
                id: "amazon.titan-text-express-v1".into(),
                display_name: "Titan Text Express".into(),
                provider: PROVIDER.into(),
                max_output_tokens: 8_192,
                context_window: 8_000,
                input_cost_per_million: 0.20,
                output_cost_per_million: 0.60,
                capabilities: vec![ModelCapability::Chat],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use tokio_util::sync::CancellationToken;

    fn provider() -> BedrockProvider {
        let config = ProviderConfig::builder().aws_credentials("AKID", "SECRET").region("us-east-1").build();
        BedrockProvider::new(config)
    }

    #[test]
    fn unknown_model_prefix_is_rejected() {
        let err = model_family("mistral.mixtral-8x7b").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidModel);
    }

    #[tokio::test]
    async fn missing_region_is_an_invalid_config_error() {
        let config = ProviderConfig::builder().aws_credentials("AKID", "SECRET").build();
        let provider = BedrockProvider::new(config);
        let request = ChatRequest::new("anthropic.claude-3-5-sonnet-20241022-v2:0", vec![ChatMessage::user("hi")]);
        let err = provider.chat_completion(&CancellationToken::new(), request).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidConfig);
    }

    #[test]
    fn classifies_throttling_as_rate_limit() {
        let err = classify_aws_error(
            reqwest::StatusCode::BAD_REQUEST,
            br#"{"__type": "ThrottlingException", "message": "Rate exceeded"}"#,
        );
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn embeddings_are_unsupported_for_non_titan_embed_models() {
        let provider = provider();
        let request = EmbeddingRequest::new("anthropic.claude-3-5-sonnet-20241022-v2:0", vec!["hi".into()]);
        let err = provider.generate_embeddings(&CancellationToken::new(), request).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::UnsupportedOperation);
    }
}
