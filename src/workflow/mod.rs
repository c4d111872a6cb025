//! AI workflow builder (C8): generates and refines workflow graphs from natural
//! language against a fixed node-type registry, with deterministic layout assignment.

mod builder;
mod conversation;
mod layout;
mod model;
mod registry;

pub use builder::{BuilderConfig, GenerateRequest, WorkflowBuilder};
pub use conversation::{ConversationRepository, ConversationService, WorkflowCreator};
pub use layout::assign_positions;
pub use model::{
    validate_workflow, Conversation, ConversationMessage, ConversationRole, ConversationStatus, GeneratedEdge,
    GeneratedNode, GeneratedWorkflow, NodeCategory, Position, WorkflowDefinition,
};
pub use registry::{default_registry, NodeRegistry, NodeTemplate, RegistryError};
