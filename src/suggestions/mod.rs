//! Smart suggestion engine (C5–C7): a deterministic pattern matcher, an optional
//! LLM-backed fallback analyzer, and the service that orchestrates both behind a
//! storage-agnostic repository contract.

mod analyzer_llm;
mod model;
mod patterns;
mod service;

pub use analyzer_llm::{AnalyzerConfig, LlmAnalyzer};
pub use model::{
    Confidence, ErrorContext, Fix, RetryFix, Source, Suggestion, SuggestionCategory, SuggestionStats,
    SuggestionStatus, SuggestionType,
};
pub use patterns::{
    category_from_http_status, default_patterns, is_retryable_category, recommended_retry_delay_ms, BuiltinPattern,
    PatternMatcher,
};
pub use service::{InMemoryRepository, Repository, SuggestionService};
