//! Node-type registry (C8): the catalog of node types the workflow builder is allowed
//! to emit.
//!
//! Grounded on the same readers-writer pattern as [`crate::providers::registry`] —
//! many concurrent lookups, exclusive mutation on register — generalized from a
//! provider-factory map to a node-template map.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::workflow::model::NodeCategory;

/// A single node type available to the workflow builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub node_type: String,
    pub display_name: String,
    pub description: String,
    pub category: NodeCategory,
    pub llm_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_config: Option<serde_json::Value>,
    pub active: bool,
}

impl NodeTemplate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_type: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        category: NodeCategory,
        llm_description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            display_name: display_name.into(),
            description: description.into(),
            category,
            llm_description: llm_description.into(),
            json_schema: None,
            example_config: None,
            active: true,
        }
    }

    pub fn with_example_config(mut self, config: serde_json::Value) -> Self {
        self.example_config = Some(config);
        self
    }

    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.json_schema = Some(schema);
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node type '{0}' is already registered")]
    Duplicate(String),
    #[error("node type must not be empty")]
    EmptyType,
}

/// Concurrency-safe map of node type → [`NodeTemplate`].
pub struct NodeRegistry {
    templates: RwLock<HashMap<String, NodeTemplate>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { templates: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, template: NodeTemplate) -> Result<(), RegistryError> {
        if template.node_type.trim().is_empty() {
            return Err(RegistryError::EmptyType);
        }
        let mut templates = self.templates.write();
        if templates.contains_key(&template.node_type) {
            return Err(RegistryError::Duplicate(template.node_type));
        }
        templates.insert(template.node_type.clone(), template);
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> Option<NodeTemplate> {
        self.templates.read().get(node_type).cloned()
    }

    pub fn get_all(&self) -> Vec<NodeTemplate> {
        let mut templates: Vec<_> = self.templates.read().values().cloned().collect();
        templates.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        templates
    }

    pub fn get_by_category(&self, category: NodeCategory) -> Vec<NodeTemplate> {
        let mut templates: Vec<_> =
            self.templates.read().values().filter(|t| t.category == category).cloned().collect();
        templates.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        templates
    }

    pub fn is_valid_type(&self, node_type: &str) -> bool {
        self.templates.read().get(node_type).is_some_and(|t| t.active)
    }

    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.templates.read().keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the canonical default registry: the trigger/action/control/integration
/// templates every installation ships with.
pub fn default_registry() -> NodeRegistry {
    let registry = NodeRegistry::new();
    for template in default_templates() {
        registry.register(template).expect("default node templates must be well-formed and unique");
    }
    registry
}

fn default_templates() -> Vec<NodeTemplate> {
    vec![
        NodeTemplate::new(
            "trigger:webhook",
            "Webhook",
            "Starts the workflow when an HTTP request is received.",
            NodeCategory::Trigger,
            "Triggers the workflow on an incoming HTTP webhook call.",
        )
        .with_example_config(serde_json::json!({ "path": "/my-webhook", "method": "POST" })),
        NodeTemplate::new(
            "trigger:schedule",
            "Schedule",
            "Starts the workflow on a recurring schedule.",
            NodeCategory::Trigger,
            "Triggers the workflow on a cron schedule.",
        )
        .with_example_config(serde_json::json!({ "cron": "0 9 * * *" })),
        NodeTemplate::new(
            "action:http",
            "HTTP Request",
            "Calls an external HTTP endpoint.",
            NodeCategory::Action,
            "Makes an HTTP request to a configured URL with a method, headers, and body.",
        )
        .with_example_config(serde_json::json!({ "url": "https://api.example.com", "method": "GET" })),
        NodeTemplate::new(
            "action:transform",
            "Transform Data",
            "Reshapes data flowing between nodes.",
            NodeCategory::Action,
            "Applies a mapping expression to transform the input data shape.",
        )
        .with_example_config(serde_json::json!({ "mapping": "{ \"id\": \"${input.id}\" }" })),
        NodeTemplate::new(
            "action:code",
            "Run Code",
            "Executes a short script against the input data.",
            NodeCategory::Action,
            "Runs a small script (e.g. JavaScript) against the input data and returns its output.",
        )
        .with_example_config(serde_json::json!({ "language": "javascript", "code": "return input;" })),
        NodeTemplate::new(
            "action:formula",
            "Formula",
            "Evaluates a spreadsheet-style formula.",
            NodeCategory::Action,
            "Evaluates a single formula expression against the input data.",
        )
        .with_example_config(serde_json::json!({ "formula": "=SUM(input.values)" })),
        NodeTemplate::new(
            "action:email",
            "Send Email",
            "Sends an email message.",
            NodeCategory::Action,
            "Sends an email with a templated subject and body to a list of recipients.",
        )
        .with_example_config(serde_json::json!({ "to": ["user@example.com"], "subject": "Hello" })),
        NodeTemplate::new(
            "control:if",
            "If",
            "Branches based on a condition.",
            NodeCategory::Control,
            "Evaluates a condition and routes execution down a \"true\" or \"false\" labeled edge.",
        )
        .with_example_config(serde_json::json!({ "condition": "${input.amount} > 100" })),
        NodeTemplate::new(
            "control:loop",
            "Loop",
            "Repeats the downstream branch for each item.",
            NodeCategory::Control,
            "Iterates over a list input, running the downstream branch once per item.",
        )
        .with_example_config(serde_json::json!({ "items": "${input.items}" })),
        NodeTemplate::new(
            "control:delay",
            "Delay",
            "Pauses execution for a fixed duration.",
            NodeCategory::Control,
            "Pauses the workflow for a configured duration before continuing.",
        )
        .with_example_config(serde_json::json!({ "duration_seconds": 60 })),
        NodeTemplate::new(
            "control:parallel",
            "Parallel",
            "Runs downstream branches concurrently.",
            NodeCategory::Control,
            "Fans execution out across multiple downstream branches and waits for all to finish.",
        )
        .with_example_config(serde_json::json!({ "branches": 2 })),
        NodeTemplate::new(
            "slack:send_message",
            "Send Slack Message",
            "Posts a message to a Slack channel.",
            NodeCategory::Integration,
            "Sends a message to a Slack channel via the configured workspace integration.",
        )
        .with_example_config(serde_json::json!({ "channel": "#general", "text": "Hello" })),
        NodeTemplate::new(
            "slack:send_dm",
            "Send Slack DM",
            "Sends a direct message to a Slack user.",
            NodeCategory::Integration,
            "Sends a direct message to a specific Slack user via the configured workspace integration.",
        )
        .with_example_config(serde_json::json!({ "user": "@jane", "text": "Hello" })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_contains_required_types() {
        let registry = default_registry();
        for expected in [
            "trigger:webhook",
            "trigger:schedule",
            "action:http",
            "action:transform",
            "action:code",
            "action:formula",
            "action:email",
            "control:if",
            "control:loop",
            "control:delay",
            "control:parallel",
            "slack:send_message",
            "slack:send_dm",
        ] {
            assert!(registry.is_valid_type(expected), "missing required type {expected}");
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = NodeRegistry::new();
        let template = NodeTemplate::new("action:http", "HTTP", "d", NodeCategory::Action, "d");
        registry.register(template.clone()).unwrap();
        assert_eq!(registry.register(template).unwrap_err(), RegistryError::Duplicate("action:http".into()));
    }

    #[test]
    fn empty_type_is_rejected() {
        let registry = NodeRegistry::new();
        let template = NodeTemplate::new("", "x", "d", NodeCategory::Action, "d");
        assert_eq!(registry.register(template).unwrap_err(), RegistryError::EmptyType);
    }

    #[test]
    fn get_by_category_filters_correctly() {
        let registry = default_registry();
        let triggers = registry.get_by_category(NodeCategory::Trigger);
        assert_eq!(triggers.len(), 2);
        assert!(triggers.iter().all(|t| t.category == NodeCategory::Trigger));
    }

    #[test]
    fn unknown_type_is_invalid() {
        let registry = default_registry();
        assert!(!registry.is_valid_type("action:does_not_exist"));
    }
}
