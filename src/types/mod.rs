//! Canonical, language-neutral chat/embedding schemas (C1).
//!
//! These are pure value types: no I/O, no provider awareness. [`crate::validation`]
//! checks them before any adapter is allowed to touch the network.

mod chat;
mod config;
mod embedding;
mod model;

pub use chat::{
    estimate_text_tokens, ChatMessage, ChatRequest, ChatResponse, RawChatMessage, ResponseFormat, Role, Usage,
};
pub use config::{config_from_credentials, ProviderConfig, ProviderConfigBuilder};
pub use embedding::{EmbeddingRequest, EmbeddingResponse};
pub use model::{ModelCapability, ModelDescriptor};
