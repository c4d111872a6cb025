//! Suggestion service (C7): orchestrates the pattern matcher and the optional LLM
//! analyzer around a storage-agnostic [`Repository`] contract.
//!
//! Modeled on the repository-behind-a-trait shape used throughout the reference
//! gateway's provider traits — callers inject storage, this module only knows the
//! contract.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SuggestionError;
use crate::providers::LlmProvider;

use super::analyzer_llm::LlmAnalyzer;
use super::model::{Confidence, ErrorContext, Suggestion, SuggestionStats, SuggestionStatus};
use super::patterns::PatternMatcher;

/// Storage contract for suggestions, scoped by tenant. Implementations must treat
/// cross-tenant reads as not-found rather than leaking another tenant's rows.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create(&self, suggestion: Suggestion) -> Result<(), SuggestionError>;
    async fn create_batch(&self, suggestions: Vec<Suggestion>) -> Result<(), SuggestionError>;
    async fn get_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Suggestion>, SuggestionError>;
    async fn list_by_execution(&self, tenant_id: &str, execution_id: &str) -> Result<Vec<Suggestion>, SuggestionError>;
    async fn update(&self, suggestion: Suggestion) -> Result<(), SuggestionError>;
    async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), SuggestionError>;
    async fn delete_by_execution(&self, tenant_id: &str, execution_id: &str) -> Result<(), SuggestionError>;
}

/// In-memory [`Repository`] used in tests and as a reference implementation; hosts
/// embedding this crate are expected to supply their own durable implementation.
#[derive(Default)]
pub struct InMemoryRepository {
    rows: parking_lot::RwLock<HashMap<(String, String), Suggestion>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, suggestion: Suggestion) -> Result<(), SuggestionError> {
        let key = (suggestion.tenant_id.clone(), suggestion.id.clone());
        self.rows.write().insert(key, suggestion);
        Ok(())
    }

    async fn create_batch(&self, suggestions: Vec<Suggestion>) -> Result<(), SuggestionError> {
        let mut rows = self.rows.write();
        for suggestion in suggestions {
            rows.insert((suggestion.tenant_id.clone(), suggestion.id.clone()), suggestion);
        }
        Ok(())
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Suggestion>, SuggestionError> {
        Ok(self.rows.read().get(&(tenant_id.to_string(), id.to_string())).cloned())
    }

    async fn list_by_execution(&self, tenant_id: &str, execution_id: &str) -> Result<Vec<Suggestion>, SuggestionError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn update(&self, suggestion: Suggestion) -> Result<(), SuggestionError> {
        let key = (suggestion.tenant_id.clone(), suggestion.id.clone());
        if !self.rows.read().contains_key(&key) {
            return Err(SuggestionError::NotFound(suggestion.id));
        }
        self.rows.write().insert(key, suggestion);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), SuggestionError> {
        self.rows.write().remove(&(tenant_id.to_string(), id.to_string()));
        Ok(())
    }

    async fn delete_by_execution(&self, tenant_id: &str, execution_id: &str) -> Result<(), SuggestionError> {
        self.rows.write().retain(|_, s| !(s.tenant_id == tenant_id && s.execution_id == execution_id));
        Ok(())
    }
}

fn confidence_rank(confidence: Confidence) -> u8 {
    match confidence {
        Confidence::High => 0,
        Confidence::Medium => 1,
        Confidence::Low => 2,
    }
}

/// Sort into the list-by-execution ordering contract: confidence high → medium → low,
/// then created_at descending within each tier.
fn apply_ordering_contract(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| {
        confidence_rank(a.confidence).cmp(&confidence_rank(b.confidence)).then(b.created_at.cmp(&a.created_at))
    });
}

pub struct SuggestionService<R: Repository> {
    repository: R,
    pattern_matcher: PatternMatcher,
    llm_analyzer: Option<LlmAnalyzer<dyn LlmProvider>>,
    use_llm_for_unmatched: bool,
}

impl<R: Repository> SuggestionService<R> {
    pub fn new(repository: R, pattern_matcher: PatternMatcher) -> Self {
        Self { repository, pattern_matcher, llm_analyzer: None, use_llm_for_unmatched: false }
    }

    pub fn with_llm_analyzer(mut self, analyzer: LlmAnalyzer<dyn LlmProvider>, use_for_unmatched: bool) -> Self {
        self.llm_analyzer = Some(analyzer);
        self.use_llm_for_unmatched = use_for_unmatched;
        self
    }

    /// Run the pattern matcher, optionally fall back to the LLM analyzer, and persist
    /// the combined (deduplicated) result in one batch.
    pub async fn analyze_error(
        &self,
        cancel: &CancellationToken,
        context: &ErrorContext,
    ) -> Vec<Suggestion> {
        let mut suggestions = if self.pattern_matcher.can_handle(context) {
            self.pattern_matcher.match_all(context)
        } else {
            Vec::new()
        };

        let only_low_confidence = !suggestions.is_empty() && suggestions.iter().all(|s| s.confidence == Confidence::Low);
        let should_try_llm = self.use_llm_for_unmatched && (suggestions.is_empty() || only_low_confidence);

        if should_try_llm {
            if let Some(analyzer) = &self.llm_analyzer {
                if analyzer.can_handle(context) {
                    match analyzer.analyze(cancel, context).await {
                        Ok(llm_suggestions) => {
                            let seen: std::collections::HashSet<_> = suggestions.iter().map(|s| s.category).collect();
                            suggestions.extend(llm_suggestions.into_iter().filter(|s| !seen.contains(&s.category)));
                        }
                        Err(err) => warn!(error = %err, "llm suggestion analysis failed"),
                    }
                }
            }
        }

        if !suggestions.is_empty() {
            if let Err(err) = self.repository.create_batch(suggestions.clone()).await {
                warn!(error = %err, execution_id = %context.execution_id, "failed to persist suggestions");
            }
        }

        suggestions
    }

    pub async fn reanalyze(
        &self,
        cancel: &CancellationToken,
        context: &ErrorContext,
    ) -> Vec<Suggestion> {
        if let Err(err) = self.repository.delete_by_execution(&context.tenant_id, &context.execution_id).await {
            warn!(error = %err, "failed to clear suggestions before reanalysis");
        }
        self.analyze_error(cancel, context).await
    }

    pub async fn apply(&self, tenant_id: &str, id: &str) -> Result<(), SuggestionError> {
        let mut suggestion =
            self.repository.get_by_id(tenant_id, id).await?.ok_or_else(|| SuggestionError::NotFound(id.to_string()))?;
        suggestion.mark_applied()?;
        self.repository.update(suggestion).await
    }

    pub async fn dismiss(&self, tenant_id: &str, id: &str) -> Result<(), SuggestionError> {
        let mut suggestion =
            self.repository.get_by_id(tenant_id, id).await?.ok_or_else(|| SuggestionError::NotFound(id.to_string()))?;
        suggestion.mark_dismissed()?;
        self.repository.update(suggestion).await
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), SuggestionError> {
        self.repository.delete(tenant_id, id).await
    }

    pub async fn list_by_execution(&self, tenant_id: &str, execution_id: &str) -> Result<Vec<Suggestion>, SuggestionError> {
        let mut suggestions = self.repository.list_by_execution(tenant_id, execution_id).await?;
        apply_ordering_contract(&mut suggestions);
        Ok(suggestions)
    }

    pub async fn get_pending(&self, tenant_id: &str, execution_id: &str) -> Result<Vec<Suggestion>, SuggestionError> {
        let mut suggestions = self.list_by_execution(tenant_id, execution_id).await?;
        suggestions.retain(|s| s.status == SuggestionStatus::Pending);
        Ok(suggestions)
    }

    pub async fn get_stats(&self, tenant_id: &str, execution_id: &str) -> Result<SuggestionStats, SuggestionError> {
        let suggestions = self.repository.list_by_execution(tenant_id, execution_id).await?;
        let mut stats = SuggestionStats { total: suggestions.len() as u64, ..Default::default() };
        for suggestion in &suggestions {
            *stats.by_status.entry(format!("{:?}", suggestion.status).to_lowercase()).or_insert(0) += 1;
            *stats.by_source.entry(format!("{:?}", suggestion.source).to_lowercase()).or_insert(0) += 1;
            *stats.by_confidence.entry(format!("{:?}", suggestion.confidence).to_lowercase()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
