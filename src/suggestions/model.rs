//! Suggestion data model (C5–C7): the value types the pattern matcher, the LLM
//! analyzer, and the suggestion service all produce and consume.
//!
//! Modeled on the canonical-type style in [`crate::types::chat`] — plain structs,
//! serde round-trippable, with a small set of constructors rather than a builder,
//! since (unlike [`crate::types::ChatRequest`]) every field here is set at creation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad classification of what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Network,
    Auth,
    Data,
    RateLimit,
    Timeout,
    Config,
    ExternalService,
    Unknown,
}

/// What kind of remediation a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Retry,
    ConfigChange,
    CredentialUpdate,
    DataFix,
    WorkflowModification,
    ManualIntervention,
}

/// How sure the engine is that this suggestion applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Pattern,
    Llm,
}

/// A suggestion's lifecycle: monotone, pending → {applied, dismissed}, no transition
/// out of either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Applied,
    Dismissed,
}

/// Backoff parameters for a proposed retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryFix {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_factor: f32,
}

/// A proposed remediation, opaque beyond the fields the engine itself needs to render
/// or apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryFix>,
}

/// A single actionable suggestion surfaced for a failed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub tenant_id: String,
    pub execution_id: String,
    pub node_id: String,
    pub category: SuggestionCategory,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub confidence: Confidence,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
    pub source: Source,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Suggestion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: impl Into<String>,
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        category: SuggestionCategory,
        suggestion_type: SuggestionType,
        confidence: Confidence,
        title: impl Into<String>,
        description: impl Into<String>,
        source: Source,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            category,
            suggestion_type,
            confidence,
            title: title.into(),
            description: description.into(),
            details: None,
            fix: None,
            source,
            status: SuggestionStatus::Pending,
            created_at: Utc::now(),
            applied_at: None,
            dismissed_at: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Transition to applied. No-op guard: once a suggestion is in a terminal state,
    /// repeated calls are rejected rather than silently overwriting `applied_at`.
    pub fn mark_applied(&mut self) -> Result<(), crate::error::SuggestionError> {
        if self.status != SuggestionStatus::Pending {
            return Err(crate::error::SuggestionError::Repository(format!(
                "suggestion '{}' is already {:?} and cannot be applied",
                self.id, self.status
            )));
        }
        self.status = SuggestionStatus::Applied;
        self.applied_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_dismissed(&mut self) -> Result<(), crate::error::SuggestionError> {
        if self.status != SuggestionStatus::Pending {
            return Err(crate::error::SuggestionError::Repository(format!(
                "suggestion '{}' is already {:?} and cannot be dismissed",
                self.id, self.status
            )));
        }
        self.status = SuggestionStatus::Dismissed;
        self.dismissed_at = Some(Utc::now());
        Ok(())
    }
}

/// Everything known about a single node failure, fed to both the pattern matcher and
/// the LLM analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub tenant_id: String,
    pub execution_id: String,
    pub workflow_id: String,
    pub node_id: String,
    pub node_type: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_config: Option<HashMap<String, serde_json::Value>>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated suggestion counts, as returned by `SuggestionService::get_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestionStats {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_source: HashMap<String, u64>,
    pub by_confidence: HashMap<String, u64>,
}
