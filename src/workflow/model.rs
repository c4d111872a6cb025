//! Workflow data model (C8): generated graphs, node templates, and conversations.
//!
//! Modeled on [`crate::suggestions::model`]'s plain-struct-plus-constructor style;
//! validation here is a free function rather than methods, since a `GeneratedWorkflow`
//! is usually deserialized straight out of a model response rather than built field by
//! field.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowValidationReason;

/// A 2D canvas position assigned by the layout algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single node in a generated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// A directed edge between two [`GeneratedNode`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The node/edge graph inside a [`GeneratedWorkflow`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<GeneratedNode>,
    #[serde(default)]
    pub edges: Vec<GeneratedEdge>,
}

/// A workflow graph produced (or refined) by the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedWorkflow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition: WorkflowDefinition,
}

/// Validate the invariants in the data model: non-empty name, at least one node, unique
/// node ids, edges whose endpoints resolve, and no self-edges. Does not check that node
/// types exist in any registry — that is the caller's job once it has one in hand.
pub fn validate_workflow(workflow: &GeneratedWorkflow) -> Result<(), WorkflowValidationReason> {
    if workflow.name.trim().is_empty() {
        return Err(WorkflowValidationReason::MissingName);
    }
    if workflow.definition.nodes.is_empty() {
        return Err(WorkflowValidationReason::NoNodes);
    }

    let mut seen_ids = HashSet::new();
    for node in &workflow.definition.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(WorkflowValidationReason::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &workflow.definition.edges {
        if edge.source == edge.target {
            return Err(WorkflowValidationReason::SelfEdge(edge.id.clone()));
        }
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(WorkflowValidationReason::EdgeEndpointMissing {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(WorkflowValidationReason::EdgeEndpointMissing {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            });
        }
    }

    Ok(())
}

/// Role of a single message within a [`Conversation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One immutable turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a [`Conversation`]. Only `Active` accepts refinement or apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Abandoned,
}

/// A multi-turn workflow-building session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub status: ConversationStatus,
    pub messages: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_workflow: Option<GeneratedWorkflow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            status: ConversationStatus::Active,
            messages: Vec::new(),
            current_workflow: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Append an immutable turn and stamp `current_workflow` (a deep copy, never a
    /// back-reference) when this turn produced or refined one.
    pub fn push_message(&mut self, role: ConversationRole, content: impl Into<String>, workflow: Option<GeneratedWorkflow>) {
        self.messages.push(ConversationMessage { role, content: content.into(), created_at: Utc::now() });
        if let Some(workflow) = workflow {
            self.current_workflow = Some(workflow);
        }
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = ConversationStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn abandon(&mut self) {
        self.status = ConversationStatus::Abandoned;
        self.updated_at = Utc::now();
    }
}

/// Category a [`crate::workflow::registry::NodeTemplate`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Trigger,
    Action,
    Control,
    Integration,
}

impl NodeCategory {
    pub fn title(self) -> &'static str {
        match self {
            NodeCategory::Trigger => "Triggers",
            NodeCategory::Action => "Actions",
            NodeCategory::Control => "Control Flow",
            NodeCategory::Integration => "Integrations",
        }
    }
}
