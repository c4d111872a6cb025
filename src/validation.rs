//! C1 validation: every check here must run, and fail, before any adapter touches the
//! network. Each failure is a [`ProviderError`] carrying the matching [`ErrorKind`].

use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatRequest, EmbeddingRequest, RawChatMessage, Role};

/// Narrow a wire-level message into a [`ChatMessage`], the pre-narrowing string check the
/// reference gateway runs on `message.role.as_str()` before a role is ever typed. This is
/// the only place an out-of-set role can be rejected — once a caller already holds a
/// [`ChatMessage`], its `role` is a closed [`Role`] and is valid by construction.
pub fn validate_chat_message(provider: &str, raw: &RawChatMessage) -> Result<ChatMessage, ProviderError> {
    let role = Role::parse(&raw.role).ok_or_else(|| ProviderError::invalid_role(provider, &raw.role))?;
    let mut message = ChatMessage::new(role, raw.content.clone());
    if let Some(name) = &raw.name {
        message = message.with_name(name.clone());
    }
    Ok(message)
}

/// Narrow a batch of wire-level messages into a [`ChatRequest`] and run the remaining C1
/// checks over it, so hosts that receive raw role strings off the wire have a single
/// entry point that can fail with `invalid-role` as well as every other validation kind.
pub fn build_chat_request(
    provider: &str,
    model: impl Into<String>,
    raw_messages: Vec<RawChatMessage>,
) -> Result<ChatRequest, ProviderError> {
    let messages = raw_messages
        .iter()
        .map(|raw| validate_chat_message(provider, raw))
        .collect::<Result<Vec<_>, _>>()?;
    let request = ChatRequest::new(model, messages);
    validate_chat_request(provider, &request)?;
    Ok(request)
}

/// Validate a [`ChatRequest`] for the named provider.
pub fn validate_chat_request(provider: &str, request: &ChatRequest) -> Result<(), ProviderError> {
    if request.model.trim().is_empty() {
        return Err(ProviderError::invalid_model(provider, &request.model));
    }
    if request.messages.is_empty() {
        return Err(ProviderError::empty_messages(provider));
    }
    if let Some(max_tokens) = request.max_tokens {
        if max_tokens == 0 {
            return Err(ProviderError::invalid_response(
                provider,
                "max_tokens must be positive",
            ));
        }
    }
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ProviderError::invalid_temperature(provider, temperature));
        }
    }
    if let Some(top_p) = request.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ProviderError::invalid_top_p(provider, top_p));
        }
    }
    Ok(())
}

/// Validate an [`EmbeddingRequest`] for the named provider.
pub fn validate_embedding_request(provider: &str, request: &EmbeddingRequest) -> Result<(), ProviderError> {
    if request.model.trim().is_empty() {
        return Err(ProviderError::invalid_model(provider, &request.model));
    }
    if request.input.is_empty() {
        return Err(ProviderError::empty_texts(provider));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_messages() {
        let request = ChatRequest::new("gpt-4", vec![]);
        let err = validate_chat_request("openai", &request).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::EmptyMessages);
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("hi")]).with_temperature(3.0);
        let err = validate_chat_request("openai", &request).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidTemperature);
    }

    #[test]
    fn accepts_well_formed_request() {
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("hi")]);
        assert!(validate_chat_request("openai", &request).is_ok());
    }

    #[test]
    fn rejects_empty_embedding_input() {
        let request = EmbeddingRequest::new("text-embedding-3-small", vec![]);
        let err = validate_embedding_request("openai", &request).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::EmptyTexts);
    }

    #[test]
    fn rejects_unknown_role_string() {
        let raw = RawChatMessage { role: "tool".to_string(), content: "hi".to_string(), name: None };
        let err = validate_chat_message("openai", &raw).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidRole);
    }

    #[test]
    fn narrows_known_role_string_case_insensitively() {
        let raw = RawChatMessage { role: "USER".to_string(), content: "hi".to_string(), name: None };
        let message = validate_chat_message("openai", &raw).unwrap();
        assert_eq!(message.role, crate::types::Role::User);
    }

    #[test]
    fn build_chat_request_surfaces_invalid_role() {
        let raw = vec![RawChatMessage { role: "function".to_string(), content: "hi".to_string(), name: None }];
        let err = build_chat_request("openai", "gpt-4", raw).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidRole);
    }

    #[test]
    fn build_chat_request_accepts_valid_roles() {
        let raw = vec![RawChatMessage { role: "user".to_string(), content: "hi".to_string(), name: None }];
        let request = build_chat_request("openai", "gpt-4", raw).unwrap();
        assert_eq!(request.messages.len(), 1);
    }
}
