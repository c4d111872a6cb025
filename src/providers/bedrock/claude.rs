//! Wire shapes for Claude-family Bedrock models (`anthropic.claude*`).
//!
//! Bedrock's `InvokeModel` body for these models is Anthropic's native Messages format
//! plus a Bedrock-specific `anthropic_version` field, so this mirrors
//! [`crate::providers::anthropic`]'s request/response transforms rather than reinventing
//! them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};

const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub fn build_request(request: &ChatRequest) -> Value {
    let mut system_parts = Vec::new();
    let mut messages = Vec::new();
    for message in &request.messages {
        match message.role {
            Role::System => system_parts.push(message.content.clone()),
            Role::User | Role::Assistant => {
                messages.push(serde_json::json!({ "role": message.role.as_str(), "content": message.content }));
            }
        }
    }

    let mut body = serde_json::json!({
        "anthropic_version": BEDROCK_ANTHROPIC_VERSION,
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
    body
}

#[derive(Debug, Deserialize)]
struct ClaudeInvokeResponse {
    id: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

pub fn parse_response(model: &str, body: &[u8]) -> Result<ChatResponse, ProviderError> {
    let parsed: ClaudeInvokeResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::invalid_response("bedrock", format!("malformed claude response: {e}")))?;

    let content = parsed
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    Ok(ChatResponse {
        id: parsed.id,
        model: model.to_string(),
        message: ChatMessage::assistant(content),
        finish_reason: parsed.stop_reason.unwrap_or_else(|| "stop".to_string()),
        usage: Usage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hoists_system_messages() {
        let request = ChatRequest::new(
            "anthropic.claude-3-5-sonnet-20241022-v2:0",
            vec![ChatMessage::system("Be terse."), ChatMessage::user("Hi")],
        );
        let body = build_request(&request);
        assert_eq!(body["system"], "Be terse.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["anthropic_version"], BEDROCK_ANTHROPIC_VERSION);
    }

    #[test]
    fn parses_invoke_response() {
        let body = json!({
            "id": "msg_bedrock_01",
            "content": [{"type": "text", "text": "Hi there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 3}
        });
        let response = parse_response("anthropic.claude-3-5-sonnet-20241022-v2:0", body.to_string().as_bytes()).unwrap();
        assert_eq!(response.message.content, "Hi there");
    }
}
