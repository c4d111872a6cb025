//! Provider adapters (C3) and the registry that instantiates them (C4).
//!
//! Every adapter exposes the same surface: [`LlmProvider`]. Wire translation lives in
//! the per-provider submodules; common policy (validate-before-I/O, status→kind
//! mapping, token estimation) is shared through free functions in [`crate::validation`]
//! and [`crate::error`].

pub mod anthropic;
pub mod bedrock;
pub mod openai;
pub mod registry;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor};

/// The uniform interface every provider adapter implements.
///
/// Implementors are immutable after construction and share no mutable state across
/// requests — HTTP clients are pooled internally, matching the cancellation-first
/// concurrency model every method below follows.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Static provider identity, e.g. `"openai"`, `"anthropic"`, `"bedrock"`.
    fn name(&self) -> &'static str;

    /// Issue a chat completion request. `cancel` is the first argument of every public
    /// operation per the concurrency model: if it fires before the exchange completes,
    /// the in-flight HTTP call is aborted and a canceled error is returned, with nothing
    /// written anywhere.
    async fn chat_completion(
        &self,
        cancel: &CancellationToken,
        request: ChatRequest,
    ) -> Result<ChatResponse, ProviderError>;

    /// Generate embeddings, preserving input order in the response regardless of the
    /// order the provider returned them in.
    async fn generate_embeddings(
        &self,
        cancel: &CancellationToken,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError>;

    /// Non-authoritative token count for `text`, computed without any network call.
    fn count_tokens(&self, text: &str) -> u32 {
        crate::types::estimate_text_tokens(text)
    }

    /// Static per-provider model descriptor table.
    fn list_models(&self) -> Vec<ModelDescriptor>;

    /// Minimal liveness probe: a single "hi" chat completion against the cheapest
    /// model. Success is defined purely by the absence of an error.
    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        let model = self
            .list_models()
            .into_iter()
            .min_by(|a, b| a.input_cost_per_million.total_cmp(&b.input_cost_per_million))
            .map(|m| m.id)
            .ok_or_else(|| ProviderError::invalid_response(self.name(), "no models available for health check"))?;

        let request = ChatRequest::new(model, vec![crate::types::ChatMessage::user("hi")]).with_max_tokens(1);
        self.chat_completion(cancel, request).await.map(|_| ())
    }
}

/// Race `fut` against `cancel`. Shared by every adapter so a fired token always wins
/// over an in-flight response, instead of each adapter re-implementing the select.
pub(crate) async fn run_cancellable<T>(
    provider: &str,
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, ProviderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::canceled(provider)),
        result = fut => Ok(result),
    }
}
