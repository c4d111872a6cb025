//! Embedding request/response types.

use serde::{Deserialize, Serialize};

/// Request for one or more embedding vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: Vec<String>) -> Self {
        Self { model: model.into(), input, user: None }
    }
}

/// Embedding vectors, one per input text, ordered to match `input` by index — never by
/// the order the provider happened to return them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}
