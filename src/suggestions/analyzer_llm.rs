//! LLM-backed fallback analyzer (C6): asks a [`crate::providers::LlmProvider`] for
//! structured suggestions when the deterministic pattern matcher comes up empty or
//! unconfident.
//!
//! Grounded on the JSON-mode request shape in [`crate::providers`] adapters plus the
//! reference gateway's tolerance for markdown-fenced model output, generalized here
//! into a dedicated parsing step since this crate has no single adapter file that does
//! exactly this.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::SuggestionError;
use crate::providers::LlmProvider;
use crate::types::{ChatMessage, ChatRequest, ResponseFormat};

use super::model::{Confidence, ErrorContext, Fix, Source, Suggestion, SuggestionCategory, SuggestionType};

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = r#"You are an assistant that diagnoses workflow execution failures. Given details about a failed node, respond with a JSON object of the exact shape {"suggestions": [{"category": "...", "type": "...", "confidence": "...", "title": "...", "description": "...", "details": "...", "fix": {...}}]}. Return only the JSON object, nothing else."#;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tenant_id: String,
}

impl AnalyzerConfig {
    pub fn new(model: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            tenant_id: tenant_id.into(),
        }
    }
}

/// Wraps a provider adapter with the prompt/parse machinery needed to turn a raw error
/// into structured [`Suggestion`]s.
pub struct LlmAnalyzer<P: LlmProvider + ?Sized> {
    provider: std::sync::Arc<P>,
    config: AnalyzerConfig,
}

impl<P: LlmProvider + ?Sized> LlmAnalyzer<P> {
    pub fn new(provider: std::sync::Arc<P>, config: AnalyzerConfig) -> Self {
        Self { provider, config }
    }

    pub fn can_handle(&self, context: &ErrorContext) -> bool {
        !context.error_message.trim().is_empty()
    }

    fn build_prompt(&self, context: &ErrorContext) -> String {
        let mut prompt = format!(
            "Node type: {}\nError message: {}\n",
            context.node_type, context.error_message
        );
        if let Some(code) = &context.error_code {
            prompt.push_str(&format!("Error code: {code}\n"));
        }
        if let Some(status) = context.http_status {
            prompt.push_str(&format!("HTTP status: {status}\n"));
        }
        prompt.push_str(&format!("Retry count: {}\n", context.retry_count));
        if let Some(input) = &context.input_data {
            if let Ok(json) = serde_json::to_string_pretty(input) {
                prompt.push_str(&format!("Input data:\n{json}\n"));
            }
        }
        if let Some(config) = &context.node_config {
            if let Ok(json) = serde_json::to_string_pretty(config) {
                prompt.push_str(&format!("Node config:\n{json}\n"));
            }
        }
        prompt
    }

    pub async fn analyze(
        &self,
        cancel: &CancellationToken,
        context: &ErrorContext,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        let request = ChatRequest::new(
            self.config.model.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(self.build_prompt(context))],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_response_format(ResponseFormat::JsonObject { schema: None });

        let response = self.provider.chat_completion(cancel, request).await?;

        parse_analysis(&response.message.content, context)
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisEnvelope {
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    category: String,
    #[serde(rename = "type")]
    suggestion_type: String,
    confidence: String,
    title: String,
    description: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    fix: Option<RawFix>,
}

#[derive(Debug, Deserialize)]
struct RawFix {
    action_type: String,
    #[serde(default)]
    config_path: Option<String>,
    #[serde(default)]
    old_value: Option<serde_json::Value>,
    #[serde(default)]
    new_value: Option<serde_json::Value>,
}

/// Strip a leading/trailing markdown code fence (` ``` ` or ` ```json `) before
/// parsing, since models routinely wrap JSON-mode output in one anyway.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn normalize_category(value: &str) -> SuggestionCategory {
    match value.to_lowercase().as_str() {
        "network" => SuggestionCategory::Network,
        "auth" => SuggestionCategory::Auth,
        "data" => SuggestionCategory::Data,
        "rate_limit" => SuggestionCategory::RateLimit,
        "timeout" => SuggestionCategory::Timeout,
        "config" => SuggestionCategory::Config,
        "external_service" => SuggestionCategory::ExternalService,
        _ => SuggestionCategory::Unknown,
    }
}

fn normalize_type(value: &str) -> SuggestionType {
    match value.to_lowercase().as_str() {
        "retry" => SuggestionType::Retry,
        "config_change" => SuggestionType::ConfigChange,
        "credential_update" => SuggestionType::CredentialUpdate,
        "data_fix" => SuggestionType::DataFix,
        "workflow_modification" => SuggestionType::WorkflowModification,
        _ => SuggestionType::ManualIntervention,
    }
}

fn normalize_confidence(value: &str) -> Confidence {
    match value.to_lowercase().as_str() {
        "high" => Confidence::High,
        "medium" => Confidence::Medium,
        _ => Confidence::Low,
    }
}

fn parse_analysis(content: &str, context: &ErrorContext) -> Result<Vec<Suggestion>, SuggestionError> {
    let stripped = strip_code_fence(content);
    let envelope: AnalysisEnvelope = serde_json::from_str(stripped)
        .map_err(|e| SuggestionError::ResponseParsing(format!("{e}: {stripped}")))?;

    Ok(envelope
        .suggestions
        .into_iter()
        .map(|raw| {
            let suggestion = Suggestion::new(
                context.tenant_id.clone(),
                context.execution_id.clone(),
                context.node_id.clone(),
                normalize_category(&raw.category),
                normalize_type(&raw.suggestion_type),
                normalize_confidence(&raw.confidence),
                raw.title,
                raw.description,
                Source::Llm,
            );
            let suggestion = match raw.details {
                Some(details) => suggestion.with_details(details),
                None => suggestion,
            };
            match raw.fix {
                Some(raw_fix) => suggestion.with_fix(Fix {
                    action_type: raw_fix.action_type,
                    config_path: raw_fix.config_path,
                    old_value: raw_fix.old_value,
                    new_value: raw_fix.new_value,
                    retry: None,
                }),
                None => suggestion,
            }
        })
        .collect())
}
