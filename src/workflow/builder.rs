//! AI workflow builder (C8): turns a natural-language description (or feedback on an
//! existing graph) into a validated [`GeneratedWorkflow`] via a [`LlmProvider`].
//!
//! Grounded on [`crate::suggestions::analyzer_llm`]'s provider-wrapping shape (a small
//! config struct, a prompt builder, markdown-tolerant JSON extraction) generalized from
//! a fixed suggestion schema to an arbitrary node-registry-driven one.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{WorkflowError, WorkflowValidationReason};
use crate::providers::LlmProvider;
use crate::types::{ChatMessage, ChatRequest, ResponseFormat};

use super::layout::assign_positions;
use super::model::{validate_workflow, GeneratedWorkflow, NodeCategory};
use super::registry::NodeRegistry;

const STYLE_RULES: &str = r#"Style rules:
- Always start the graph with a trigger node.
- Give every node a short, descriptive id (e.g. "fetch_customer", not "node1").
- For a control:if node, label its outgoing edges "true" and "false".
- Reference upstream output with the template syntax ${steps.<nodeId>.output.<field>}.
- Respond with exactly one JSON object and nothing else."#;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl BuilderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), temperature: 0.2, max_tokens: 4096 }
    }
}

/// Everything the caller knows going into a generation, besides conversation history.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub description: String,
    pub available_integrations: Vec<String>,
    pub max_nodes: Option<u32>,
    pub allowed_types: Option<Vec<String>>,
}

fn validate_generate_request(request: &GenerateRequest) -> Result<(), WorkflowError> {
    if request.description.trim().chars().count() < 10 {
        return Err(WorkflowError::DescriptionTooShort);
    }
    if let Some(max_nodes) = request.max_nodes {
        if max_nodes == 0 {
            return Err(WorkflowError::InvalidMaxNodes);
        }
    }
    Ok(())
}

fn compose_user_prompt(request: &GenerateRequest) -> String {
    let mut prompt = request.description.trim().to_string();

    if !request.available_integrations.is_empty() {
        prompt.push_str(&format!("\n\nAvailable integrations: {}", request.available_integrations.join(", ")));
    }

    let mut constraints = Vec::new();
    if let Some(max_nodes) = request.max_nodes {
        constraints.push(format!("Maximum nodes allowed: {max_nodes}"));
    }
    if let Some(allowed_types) = &request.allowed_types {
        constraints.push(format!("Allowed node types: {}", allowed_types.join(", ")));
    }
    if !constraints.is_empty() {
        prompt.push_str(&format!("\n\n{}", constraints.join("\n")));
    }

    prompt
}

fn compose_refinement_prompt(workflow: &GeneratedWorkflow, feedback: &str) -> Result<String, WorkflowError> {
    let current = serde_json::to_string_pretty(workflow).map_err(|e| WorkflowError::Parse(e.to_string()))?;
    Ok(format!("Current workflow:\n{current}\n\nRequested change: {}", feedback.trim()))
}

#[derive(Debug, Deserialize)]
struct GenerationEnvelope {
    workflow: GeneratedWorkflow,
    #[serde(default)]
    explanation: String,
}

/// Extract the JSON object from a model response: unwrap a fenced code block if
/// present, else slice from the first `{` to the last `}`, else take the content as-is.
/// Idempotent on an already-stripped object — it strips at most one level of fencing.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches('\n');
        if let Some(body) = rest.strip_suffix("```") {
            return body.trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Generates and refines workflow graphs against a fixed [`NodeRegistry`], via an
/// injected [`LlmProvider`].
pub struct WorkflowBuilder<P: LlmProvider + ?Sized> {
    provider: Arc<P>,
    registry: Arc<NodeRegistry>,
    config: BuilderConfig,
}

impl<P: LlmProvider + ?Sized> WorkflowBuilder<P> {
    pub fn new(provider: Arc<P>, registry: Arc<NodeRegistry>, config: BuilderConfig) -> Self {
        Self { provider, registry, config }
    }

    /// Render the registry as a human-readable catalog, grouped by category with
    /// title-cased headings, for injection into the system prompt.
    pub fn build_llm_context(&self) -> String {
        let mut sections = Vec::new();
        for category in [NodeCategory::Trigger, NodeCategory::Action, NodeCategory::Control, NodeCategory::Integration] {
            let templates = self.registry.get_by_category(category);
            if templates.is_empty() {
                continue;
            }
            let mut section = format!("{}:\n", category.title());
            for template in &templates {
                section.push_str(&format!("- {} ({}): {}\n", template.display_name, template.node_type, template.llm_description));
                if let Some(example) = &template.example_config {
                    if let Ok(pretty) = serde_json::to_string_pretty(example) {
                        section.push_str(&format!("  Example config: {pretty}\n"));
                    }
                }
            }
            sections.push(section);
        }
        sections.join("\n")
    }

    fn system_prompt(&self) -> String {
        format!(
            "You design workflow automation graphs. Available node types:\n\n{}\n\nRespond with a JSON object of the shape \
             {{\"workflow\":{{\"name\":\"...\",\"description\":\"...\",\"definition\":{{\"nodes\":[...],\"edges\":[...]}}}},\"explanation\":\"...\"}}.\n\n{}",
            self.build_llm_context(),
            STYLE_RULES
        )
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        history: &[ChatMessage],
        user_prompt: String,
    ) -> Result<(GeneratedWorkflow, String), WorkflowError> {
        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(user_prompt));

        let request = ChatRequest::new(self.config.model.clone(), messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_response_format(ResponseFormat::JsonObject { schema: None });

        let response = self.provider.chat_completion(cancel, request).await.map_err(WorkflowError::Generation)?;

        let json_str = extract_json(&response.message.content);
        let envelope: GenerationEnvelope =
            serde_json::from_str(json_str).map_err(|e| WorkflowError::Parse(format!("{e}: {json_str}")))?;

        validate_workflow(&envelope.workflow)?;

        for node in &envelope.workflow.definition.nodes {
            if !self.registry.is_valid_type(&node.node_type) {
                return Err(WorkflowError::Invalid(WorkflowValidationReason::UnknownNodeType {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                }));
            }
        }

        let mut workflow = envelope.workflow;
        assign_positions(&mut workflow);

        Ok((workflow, envelope.explanation))
    }

    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        request: &GenerateRequest,
        history: &[ChatMessage],
    ) -> Result<(GeneratedWorkflow, String), WorkflowError> {
        validate_generate_request(request)?;
        let user_prompt = compose_user_prompt(request);
        self.run(cancel, history, user_prompt).await
    }

    pub async fn refine(
        &self,
        cancel: &CancellationToken,
        workflow: &GeneratedWorkflow,
        feedback: &str,
        history: &[ChatMessage],
    ) -> Result<(GeneratedWorkflow, String), WorkflowError> {
        if feedback.trim().is_empty() {
            return Err(WorkflowError::EmptyFeedback);
        }
        let user_prompt = compose_refinement_prompt(workflow, feedback)?;
        self.run(cancel, history, user_prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let content = "```json\n{\"workflow\": {}}\n```";
        assert_eq!(extract_json(content), "{\"workflow\": {}}");
    }

    #[test]
    fn extracts_json_from_prose_wrapper() {
        let content = "Sure, here you go:\n{\"workflow\": {}}\nLet me know if you need changes.";
        assert_eq!(extract_json(content), "{\"workflow\": {}}");
    }

    #[test]
    fn extract_json_is_idempotent_on_already_stripped_input() {
        let content = "{\"workflow\": {}}";
        assert_eq!(extract_json(content), extract_json(extract_json(content)));
    }

    #[test]
    fn too_short_description_is_rejected() {
        let request = GenerateRequest { description: "short".into(), ..Default::default() };
        assert!(matches!(validate_generate_request(&request), Err(WorkflowError::DescriptionTooShort)));
    }

    #[test]
    fn zero_max_nodes_is_rejected() {
        let request =
            GenerateRequest { description: "a long enough description".into(), max_nodes: Some(0), ..Default::default() };
        assert!(matches!(validate_generate_request(&request), Err(WorkflowError::InvalidMaxNodes)));
    }

    #[test]
    fn user_prompt_includes_constraints_and_integrations() {
        let request = GenerateRequest {
            description: "Notify sales when a deal closes".into(),
            available_integrations: vec!["slack".into(), "salesforce".into()],
            max_nodes: Some(5),
            allowed_types: Some(vec!["trigger:webhook".into()]),
        };
        let prompt = compose_user_prompt(&request);
        assert!(prompt.contains("Available integrations: slack, salesforce"));
        assert!(prompt.contains("Maximum nodes allowed: 5"));
        assert!(prompt.contains("Allowed node types: trigger:webhook"));
    }
}
