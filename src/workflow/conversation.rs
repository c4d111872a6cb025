//! Conversation orchestration (C8): wraps a [`WorkflowBuilder`] around a
//! [`ConversationRepository`] and a [`WorkflowCreator`], the two host-owned
//! collaborators the design notes call for instead of a direct storage↔builder cycle.
//!
//! Mirrors [`crate::suggestions::service::SuggestionService`]'s shape: a thin
//! orchestrator over a storage trait, kept separate from the pure generation logic in
//! [`super::builder`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowError;
use crate::providers::LlmProvider;
use crate::types::ChatMessage;

use super::builder::{GenerateRequest, WorkflowBuilder};
use super::model::{Conversation, ConversationRole, GeneratedWorkflow};

/// Storage contract for conversations, scoped by tenant. A cross-tenant lookup must
/// behave as not-found, matching [`crate::suggestions::service::Repository`].
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Conversation>, WorkflowError>;
    async fn save(&self, conversation: Conversation) -> Result<(), WorkflowError>;
}

/// The host's sink for a validated workflow graph — kept as a separate collaborator
/// from [`ConversationRepository`] so a conversation never back-references the
/// workflow store it was generated into.
#[async_trait]
pub trait WorkflowCreator: Send + Sync {
    async fn create(&self, tenant_id: &str, workflow: &GeneratedWorkflow) -> Result<String, WorkflowError>;
}

fn history_from(conversation: &Conversation) -> Vec<ChatMessage> {
    conversation
        .messages
        .iter()
        .map(|m| match m.role {
            ConversationRole::User => ChatMessage::user(m.content.clone()),
            ConversationRole::Assistant => ChatMessage::assistant(m.content.clone()),
            ConversationRole::System => ChatMessage::system(m.content.clone()),
        })
        .collect()
}

fn require_active(conversation: &Conversation) -> Result<(), WorkflowError> {
    if !conversation.is_active() {
        return Err(WorkflowError::ConversationNotActive(conversation.id.clone()));
    }
    Ok(())
}

pub struct ConversationService<P: LlmProvider + ?Sized, R: ConversationRepository, C: WorkflowCreator> {
    builder: WorkflowBuilder<P>,
    repository: R,
    creator: C,
}

impl<P: LlmProvider + ?Sized, R: ConversationRepository, C: WorkflowCreator> ConversationService<P, R, C> {
    pub fn new(builder: WorkflowBuilder<P>, repository: R, creator: C) -> Self {
        Self { builder, repository, creator }
    }

    async fn load(&self, tenant_id: &str, conversation_id: &str) -> Result<Conversation, WorkflowError> {
        self.repository
            .get(tenant_id, conversation_id)
            .await?
            .ok_or_else(|| WorkflowError::ConversationNotFound(conversation_id.to_string()))
    }

    /// Generate a workflow within an existing, active conversation and append both
    /// turns (the user's description, the assistant's explanation) to its history.
    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        conversation_id: &str,
        request: &GenerateRequest,
    ) -> Result<GeneratedWorkflow, WorkflowError> {
        let mut conversation = self.load(tenant_id, conversation_id).await?;
        require_active(&conversation)?;

        let history = history_from(&conversation);
        let (workflow, explanation) = self.builder.generate(cancel, request, &history).await?;

        conversation.push_message(ConversationRole::User, request.description.clone(), None);
        conversation.push_message(ConversationRole::Assistant, explanation, Some(workflow.clone()));
        self.repository.save(conversation).await?;

        Ok(workflow)
    }

    /// Refine the conversation's current workflow with `feedback`. Requires the
    /// conversation to be active and to already hold a current workflow.
    pub async fn refine(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        conversation_id: &str,
        feedback: &str,
    ) -> Result<GeneratedWorkflow, WorkflowError> {
        let mut conversation = self.load(tenant_id, conversation_id).await?;
        require_active(&conversation)?;

        if feedback.trim().is_empty() {
            return Err(WorkflowError::EmptyFeedback);
        }
        let current = conversation
            .current_workflow
            .clone()
            .ok_or_else(|| WorkflowError::ConversationNotFound(conversation_id.to_string()))?;

        let history = history_from(&conversation);
        let (workflow, explanation) = self.builder.refine(cancel, &current, feedback, &history).await?;

        conversation.push_message(ConversationRole::User, feedback.to_string(), None);
        conversation.push_message(ConversationRole::Assistant, explanation, Some(workflow.clone()));
        self.repository.save(conversation).await?;

        Ok(workflow)
    }

    /// Persist the conversation's current workflow through the [`WorkflowCreator`] and
    /// mark the conversation completed.
    pub async fn apply(&self, tenant_id: &str, conversation_id: &str) -> Result<String, WorkflowError> {
        let mut conversation = self.load(tenant_id, conversation_id).await?;
        require_active(&conversation)?;

        let workflow = conversation
            .current_workflow
            .clone()
            .ok_or_else(|| WorkflowError::ConversationNotFound(conversation_id.to_string()))?;

        let workflow_id = self.creator.create(tenant_id, &workflow).await?;
        conversation.complete();
        self.repository.save(conversation).await?;

        Ok(workflow_id)
    }

    pub async fn abandon(&self, tenant_id: &str, conversation_id: &str) -> Result<(), WorkflowError> {
        let mut conversation = self.load(tenant_id, conversation_id).await?;
        require_active(&conversation)?;
        conversation.abandon();
        self.repository.save(conversation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::LlmProvider;
    use crate::types::{ChatResponse, EmbeddingRequest, EmbeddingResponse, ModelDescriptor, Usage};
    use crate::workflow::builder::BuilderConfig;
    use crate::workflow::registry::default_registry;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubProvider {
        body: String,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn chat_completion(
            &self,
            _cancel: &CancellationToken,
            request: crate::types::ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                id: "stub-1".into(),
                model: request.model,
                message: ChatMessage::assistant(self.body.clone()),
                finish_reason: "stop".into(),
                usage: Usage::new(10, 5),
            })
        }

        async fn generate_embeddings(
            &self,
            _cancel: &CancellationToken,
            _request: EmbeddingRequest,
        ) -> Result<EmbeddingResponse, ProviderError> {
            Err(ProviderError::unsupported_operation("stub", "generate_embeddings"))
        }

        fn list_models(&self) -> Vec<ModelDescriptor> {
            vec![]
        }
    }

    #[derive(Default)]
    struct InMemoryConversationRepository {
        rows: RwLock<HashMap<(String, String), Conversation>>,
    }

    #[async_trait]
    impl ConversationRepository for InMemoryConversationRepository {
        async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Conversation>, WorkflowError> {
            Ok(self.rows.read().get(&(tenant_id.to_string(), id.to_string())).cloned())
        }

        async fn save(&self, conversation: Conversation) -> Result<(), WorkflowError> {
            self.rows.write().insert((conversation.tenant_id.clone(), conversation.id.clone()), conversation);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCreator {
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkflowCreator for RecordingCreator {
        async fn create(&self, _tenant_id: &str, workflow: &GeneratedWorkflow) -> Result<String, WorkflowError> {
            self.created.lock().unwrap().push(workflow.name.clone());
            Ok(format!("workflow-{}", self.created.lock().unwrap().len()))
        }
    }

    fn sample_body() -> String {
        serde_json::json!({
            "workflow": {
                "name": "Deal Notifier",
                "description": "Notifies sales on a closed deal",
                "definition": {
                    "nodes": [
                        {"id": "on_webhook", "type": "trigger:webhook", "name": "Webhook"},
                        {"id": "notify", "type": "slack:send_message", "name": "Notify"}
                    ],
                    "edges": [
                        {"id": "e1", "source": "on_webhook", "target": "notify"}
                    ]
                }
            },
            "explanation": "Created a webhook trigger feeding a Slack notification."
        })
        .to_string()
    }

    async fn service_with_active_conversation() -> (
        ConversationService<StubProvider, InMemoryConversationRepository, RecordingCreator>,
        String,
    ) {
        let provider = Arc::new(StubProvider { body: sample_body() });
        let registry = Arc::new(default_registry());
        let builder = WorkflowBuilder::new(provider, registry, BuilderConfig::new("gpt-4"));
        let repository = InMemoryConversationRepository::default();
        let creator = RecordingCreator::default();

        let conversation = Conversation::new("tenant-1", "user-1");
        let id = conversation.id.clone();
        repository.save(conversation).await.unwrap();

        (ConversationService::new(builder, repository, creator), id)
    }

    #[tokio::test]
    async fn generate_persists_workflow_into_conversation_history() {
        let (service, conversation_id) = service_with_active_conversation().await;
        let cancel = CancellationToken::new();
        let request = GenerateRequest { description: "Notify sales when a deal closes".into(), ..Default::default() };

        let workflow = service.generate(&cancel, "tenant-1", &conversation_id, &request).await.unwrap();
        assert_eq!(workflow.name, "Deal Notifier");

        let stored = service.load("tenant-1", &conversation_id).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert!(stored.current_workflow.is_some());
    }

    #[tokio::test]
    async fn apply_marks_conversation_completed_and_calls_creator() {
        let (service, conversation_id) = service_with_active_conversation().await;
        let cancel = CancellationToken::new();
        let request = GenerateRequest { description: "Notify sales when a deal closes".into(), ..Default::default() };
        service.generate(&cancel, "tenant-1", &conversation_id, &request).await.unwrap();

        let workflow_id = service.apply("tenant-1", &conversation_id).await.unwrap();
        assert_eq!(workflow_id, "workflow-1");

        let stored = service.load("tenant-1", &conversation_id).await.unwrap();
        assert!(!stored.is_active());
    }

    #[tokio::test]
    async fn refine_on_completed_conversation_is_rejected() {
        let (service, conversation_id) = service_with_active_conversation().await;
        let cancel = CancellationToken::new();
        let request = GenerateRequest { description: "Notify sales when a deal closes".into(), ..Default::default() };
        service.generate(&cancel, "tenant-1", &conversation_id, &request).await.unwrap();
        service.apply("tenant-1", &conversation_id).await.unwrap();

        let err = service.refine(&cancel, "tenant-1", &conversation_id, "add a delay").await.unwrap_err();
        assert!(matches!(err, WorkflowError::ConversationNotActive(_)));
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (service, _) = service_with_active_conversation().await;
        let cancel = CancellationToken::new();
        let request = GenerateRequest { description: "Notify sales when a deal closes".into(), ..Default::default() };
        let err = service.generate(&cancel, "tenant-1", "missing-id", &request).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ConversationNotFound(_)));
    }
}
