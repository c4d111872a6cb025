//! Wire shapes for Amazon Titan text and embedding models (`amazon.titan*`).
//!
//! Titan has no chat-turn concept, so the adapter flattens [`ChatRequest::messages`]
//! into a single role-prefixed prompt, the same collapsing strategy
//! `bedrock::client.rs`'s model-family dispatch uses for non-conversational model
//! families.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};

const DEFAULT_MAX_TOKEN_COUNT: u32 = 4096;

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::System => "Instructions",
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

/// Flatten a conversation into the single prompt Titan expects, terminated with a bare
/// "Assistant:" line to cue where the completion should continue from.
fn flatten_prompt(request: &ChatRequest) -> String {
    let mut lines: Vec<String> =
        request.messages.iter().map(|m| format!("{}: {}", role_prefix(m.role), m.content)).collect();
    lines.push("Assistant:".to_string());
    lines.join("\n")
}

pub fn build_request(request: &ChatRequest) -> Value {
    let mut body = serde_json::json!({ "inputText": flatten_prompt(request) });

    let has_generation_config =
        request.max_tokens.is_some() || request.temperature.is_some() || request.top_p.is_some() || request.stop.is_some();
    if has_generation_config {
        let mut config = serde_json::json!({});
        config["maxTokenCount"] = Value::from(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKEN_COUNT));
        if let Some(v) = request.temperature {
            config["temperature"] = Value::from(v);
        }
        if let Some(v) = request.top_p {
            config["topP"] = Value::from(v);
        }
        if let Some(v) = &request.stop {
            config["stopSequences"] = Value::from(v.clone());
        }
        body["textGenerationConfig"] = config;
    }

    body
}

#[derive(Debug, Deserialize)]
struct TitanInvokeResponse {
    #[serde(rename = "inputTextTokenCount")]
    input_text_token_count: u32,
    results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
struct TitanResult {
    #[serde(rename = "tokenCount")]
    token_count: u32,
    #[serde(rename = "outputText")]
    output_text: String,
    #[serde(rename = "completionReason")]
    completion_reason: Option<String>,
}

/// Titan's response carries no request id, so one is synthesized from a fresh UUID —
/// the same scheme the reference gateway uses for providers whose wire format has no
/// native completion id.
pub fn parse_response(model: &str, body: &[u8]) -> Result<ChatResponse, ProviderError> {
    let parsed: TitanInvokeResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::invalid_response("bedrock", format!("malformed titan response: {e}")))?;

    let result = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::invalid_response("bedrock", "titan response contained no results"))?;

    let id = format!("titan-{}-{}", parsed.input_text_token_count, uuid::Uuid::new_v4());
    let finish_reason = match result.completion_reason.as_deref() {
        Some("LENGTH") => "length",
        Some("FINISH") | None => "stop",
        Some(other) => other,
    };

    Ok(ChatResponse {
        id,
        model: model.to_string(),
        message: ChatMessage::assistant(result.output_text.trim().to_string()),
        finish_reason: finish_reason.to_string(),
        usage: Usage::new(parsed.input_text_token_count, result.token_count),
    })
}

pub fn build_embedding_request(text: &str) -> Value {
    serde_json::json!({ "inputText": text })
}

#[derive(Debug, Deserialize)]
struct TitanEmbeddingResponse {
    embedding: Vec<f32>,
    #[serde(rename = "inputTextTokenCount")]
    input_text_token_count: u32,
}

/// Parse a single Titan embedding response. Bedrock issues one `InvokeModel` call per
/// input text — there is no batch embeddings endpoint for this family.
pub fn parse_embedding_response(body: &[u8]) -> Result<(Vec<f32>, u32), ProviderError> {
    let parsed: TitanEmbeddingResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::invalid_response("bedrock", format!("malformed titan embedding response: {e}")))?;
    Ok((parsed.embedding, parsed.input_text_token_count))
}
