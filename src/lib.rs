//! Multi-provider LLM gateway core: canonical request/response types, provider
//! adapters (OpenAI, Anthropic, Bedrock), a pattern- and LLM-backed error suggestion
//! engine, and an AI-assisted workflow builder.
//!
//! This crate is the embeddable core; it has no HTTP server, database, or auth layer
//! of its own — those are the host application's concern. It exposes traits and value
//! types a host wires into its own request path.

pub mod error;
pub mod providers;
pub mod suggestions;
pub mod types;
pub mod validation;
pub mod workflow;

pub use error::{ErrorKind, GatewayError, ProviderError, Result, SuggestionError, WorkflowError};
pub use providers::anthropic::AnthropicProvider;
pub use providers::bedrock::BedrockProvider;
pub use providers::openai::OpenAiProvider;
pub use providers::registry::{ProviderFactory, ProviderRegistry};
pub use providers::LlmProvider;
pub use suggestions::{
    AnalyzerConfig, Confidence, ErrorContext, Fix, LlmAnalyzer, PatternMatcher, RetryFix, Source, Suggestion,
    SuggestionCategory, SuggestionService, SuggestionStats, SuggestionStatus, SuggestionType,
};
pub use types::{
    config_from_credentials, estimate_text_tokens, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest,
    EmbeddingResponse, ModelCapability, ModelDescriptor, ProviderConfig, ProviderConfigBuilder, RawChatMessage,
    ResponseFormat, Role, Usage,
};
pub use workflow::{
    default_registry, Conversation, ConversationService, GenerateRequest, GeneratedWorkflow, NodeRegistry,
    NodeTemplate, WorkflowBuilder,
};
