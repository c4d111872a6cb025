//! Error taxonomy for the gateway.
//!
//! [`ProviderError`] is the structured value every provider adapter and every piece of
//! C1 validation returns; it is never an opaque string. [`GatewayError`] sits above it
//! and the suggestion/workflow subsystem errors so host code can match on one type at
//! the call boundary, the way `utils::error::GatewayError` wraps provider errors in the
//! reference gateway this crate is patterned on.

use std::fmt;

/// Closed set of error causes a [`ProviderError`] can carry.
///
/// This is the sentinel set named in the error-handling design: every wire-level or
/// validation failure is normalized into exactly one of these before it leaves the
/// provider layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfig,
    InvalidApiKey,
    Unauthorized,
    InvalidModel,
    InvalidRole,
    InvalidTemperature,
    InvalidTopP,
    EmptyMessages,
    EmptyTexts,
    InvalidResponse,
    RateLimitExceeded,
    ContextTooLong,
    TokenLimitExceeded,
    QuotaExceeded,
    ProviderUnavailable,
    ProviderTimeout,
    ProviderNotFound,
    ContentFiltered,
    UnsupportedOperation,
    Canceled,
}

impl ErrorKind {
    /// Whether this kind is inherently retryable, independent of any provider-supplied
    /// retryable flag. Used as the default when a provider error is constructed without
    /// an explicit override.
    fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimitExceeded
                | ErrorKind::ProviderUnavailable
                | ErrorKind::ProviderTimeout
        )
    }
}

/// A structured, provider-tagged error.
///
/// Carries everything callers need to decide whether to retry, refresh credentials, or
/// surface the failure to an end user, without inspecting a free-text message.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub code: Option<String>,
    pub message: String,
    pub http_status: u16,
    pub retry_after: Option<u64>,
    pub retryable: bool,
    pub kind: ErrorKind,
}

impl ProviderError {
    /// Construct a provider error, deriving the default retryable flag from `kind`.
    pub fn new(provider: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            code: None,
            message: message.into(),
            http_status: 0,
            retry_after: None,
            retryable: kind.default_retryable(),
            kind,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self.retryable = true;
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new("config", ErrorKind::InvalidConfig, message)
    }

    pub fn invalid_api_key(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::InvalidApiKey, message).with_http_status(401)
    }

    pub fn unauthorized(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::Unauthorized, message).with_http_status(403)
    }

    pub fn invalid_model(provider: impl Into<String>, model: &str) -> Self {
        Self::new(
            provider,
            ErrorKind::InvalidModel,
            format!("unknown or unsupported model '{model}'"),
        )
    }

    pub fn invalid_role(provider: impl Into<String>, role: &str) -> Self {
        Self::new(provider, ErrorKind::InvalidRole, format!("invalid role '{role}'"))
    }

    pub fn invalid_temperature(provider: impl Into<String>, value: f32) -> Self {
        Self::new(
            provider,
            ErrorKind::InvalidTemperature,
            format!("temperature {value} is outside the valid range [0, 2]"),
        )
    }

    pub fn invalid_top_p(provider: impl Into<String>, value: f32) -> Self {
        Self::new(
            provider,
            ErrorKind::InvalidTopP,
            format!("top_p {value} is outside the valid range [0, 1]"),
        )
    }

    pub fn empty_messages(provider: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::EmptyMessages, "messages must contain at least one entry")
    }

    pub fn empty_texts(provider: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::EmptyTexts, "input texts must contain at least one entry")
    }

    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::RateLimitExceeded, message).with_http_status(429)
    }

    pub fn context_too_long(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::ContextTooLong, message)
    }

    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::ProviderUnavailable, message).with_http_status(503)
    }

    pub fn provider_timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::ProviderTimeout, message).with_http_status(408)
    }

    pub fn provider_not_found(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        Self::new(
            provider.clone(),
            ErrorKind::ProviderNotFound,
            format!("provider '{provider}' is not registered"),
        )
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::InvalidResponse, message)
    }

    pub fn unsupported_operation(provider: impl Into<String>, operation: &str) -> Self {
        Self::new(
            provider,
            ErrorKind::UnsupportedOperation,
            format!("operation '{operation}' is not supported by this provider"),
        )
    }

    /// The request was aborted by its cancellation token before it completed. Never
    /// retried automatically — the caller asked for this.
    pub fn canceled(provider: impl Into<String>) -> Self {
        Self::new(provider, ErrorKind::Canceled, "operation was canceled").retryable(false)
    }

    /// True if this error represents a rate-limit condition, by kind or by the common
    /// heuristics (HTTP 429, a `rate_limit` code, or a "rate limit" substring).
    pub fn is_rate_limit(&self) -> bool {
        self.kind == ErrorKind::RateLimitExceeded
            || self.http_status == 429
            || self
                .code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case("rate_limit_error") || c.eq_ignore_ascii_case("rate_limit"))
            || self.message.to_lowercase().contains("rate limit")
    }

    /// True if this error represents an authentication/authorization failure.
    pub fn is_auth(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidApiKey | ErrorKind::Unauthorized)
            || matches!(self.http_status, 401 | 403)
    }

    /// True if this error represents a context-length overflow.
    pub fn is_context_length(&self) -> bool {
        self.kind == ErrorKind::ContextTooLong
            || self
                .code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case("context_length_exceeded"))
    }

    /// True if the caller should retry this request (after `retry_after`, when present).
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Seconds the caller should wait before retrying, if known.
    pub fn get_retry_after(&self) -> Option<u64> {
        self.retry_after
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.retry_after) {
            (Some(code), Some(after)) => write!(
                f,
                "{} error [{}]: {} (retry after {}s)",
                self.provider, code, self.message, after
            ),
            (Some(code), None) => write!(f, "{} error [{}]: {}", self.provider, code, self.message),
            (None, _) => write!(f, "{} error: {}", self.provider, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors raised by the suggestion subsystem (C5–C7).
#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("suggestion '{0}' not found")]
    NotFound(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] ProviderError),

    #[error("failed to parse analyzer response: {0}")]
    ResponseParsing(String),
}

/// The specific reason a [`crate::workflow::model::GeneratedWorkflow`] failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowValidationReason {
    #[error("workflow name is required")]
    MissingName,

    #[error("workflow must contain at least one node")]
    NoNodes,

    #[error("node '{node_id}' has unknown type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("edge '{edge_id}' references missing node '{node_id}'")]
    EdgeEndpointMissing { edge_id: String, node_id: String },

    #[error("edge '{0}' cannot reference the same node as both source and target")]
    SelfEdge(String),
}

/// Errors raised by the AI workflow builder (C8).
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid workflow: {0}")]
    Invalid(#[from] WorkflowValidationReason),

    #[error("failed to generate workflow: {0}")]
    Generation(#[source] ProviderError),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("description must be at least 10 characters")]
    DescriptionTooShort,

    #[error("max_nodes must be positive")]
    InvalidMaxNodes,

    #[error("conversation '{0}' is not active")]
    ConversationNotActive(String),

    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("feedback must not be empty")]
    EmptyFeedback,
}

/// Top-level error type returned at the gateway's public boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Suggestion(#[from] SuggestionError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("operation was canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_retry_after() {
        let err = ProviderError::rate_limit("openai", "too many requests")
            .with_code("rate_limit_error")
            .with_retry_after(30);
        assert_eq!(
            err.to_string(),
            "openai error [rate_limit_error]: too many requests (retry after 30s)"
        );
    }

    #[test]
    fn formats_with_code_only() {
        let err = ProviderError::invalid_api_key("openai", "bad key").with_code("invalid_api_key");
        assert_eq!(err.to_string(), "openai error [invalid_api_key]: bad key");
    }

    #[test]
    fn formats_plain() {
        let err = ProviderError::invalid_model("openai", "gpt-unknown");
        assert_eq!(err.to_string(), "openai error: unknown or unsupported model 'gpt-unknown'");
    }

    #[test]
    fn rate_limit_detection_by_status() {
        let err = ProviderError::new("anthropic", ErrorKind::ProviderUnavailable, "x").with_http_status(429);
        assert!(err.is_rate_limit());
    }

    #[test]
    fn default_retryability_matches_kind() {
        assert!(ProviderError::provider_unavailable("openai", "down").is_retryable());
        assert!(!ProviderError::invalid_model("openai", "x").is_retryable());
    }
}
