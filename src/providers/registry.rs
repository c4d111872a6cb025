//! Provider registry (C4): a process-wide name→factory map.
//!
//! Generalizes the reference gateway's `ProviderRegistry` (a plain, single-threaded
//! `HashMap<String, Provider>` in `provider_registry.rs`) into a factory registry
//! behind a reader-writer lock, since this spec requires concurrent lookups with
//! exclusive registration/unregistration — a discipline the teacher's registry did not
//! need because it only ever ran inside one coordinating task.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ProviderError;
use crate::providers::LlmProvider;
use crate::types::ProviderConfig;

/// A factory that builds a boxed provider from a [`ProviderConfig`].
pub type ProviderFactory = Arc<dyn Fn(ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> + Send + Sync>;

/// Name→factory map with readers-writer concurrency: many concurrent `get_provider`
/// calls, exclusive `register`/`unregister`.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// Register a factory under `name` (case-insensitive). Fails on an empty name or a
    /// duplicate registration.
    pub fn register(&self, name: &str, factory: ProviderFactory) -> Result<(), ProviderError> {
        let key = normalize(name)?;
        let mut factories = self.factories.write();
        if factories.contains_key(&key) {
            return Err(ProviderError::invalid_response(
                "registry",
                format!("provider '{key}' is already registered"),
            ));
        }
        factories.insert(key, factory);
        Ok(())
    }

    /// Instantiate the provider registered under `name`.
    pub fn get_provider(&self, name: &str, config: ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = normalize(name)?;
        let factories = self.factories.read();
        let factory = factories.get(&key).ok_or_else(|| ProviderError::provider_not_found(key.clone()))?;
        factory(config)
    }

    pub fn has_provider(&self, name: &str) -> bool {
        match normalize(name) {
            Ok(key) => self.factories.read().contains_key(&key),
            Err(_) => false,
        }
    }

    pub fn list(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Remove a registration. Idempotent: unregistering an unknown name is not an error.
    pub fn unregister(&self, name: &str) {
        if let Ok(key) = normalize(name) {
            self.factories.write().remove(&key);
        }
    }
}

fn normalize(name: &str) -> Result<String, ProviderError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::invalid_response("registry", "provider name must not be empty"));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::openai::OpenAiProvider;

    fn dummy_factory() -> ProviderFactory {
        Arc::new(|config: ProviderConfig| Ok(Arc::new(OpenAiProvider::new(config)) as Arc<dyn LlmProvider>))
    }

    #[test]
    fn registers_and_resolves() {
        let registry = ProviderRegistry::new();
        registry.register("OpenAI", dummy_factory()).unwrap();
        assert!(registry.has_provider("openai"));
        let provider = registry.get_provider("openai", ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn rejects_empty_name() {
        let registry = ProviderRegistry::new();
        assert!(registry.register("   ", dummy_factory()).is_err());
    }

    #[test]
    fn rejects_duplicate_registration() {
        let registry = ProviderRegistry::new();
        registry.register("openai", dummy_factory()).unwrap();
        assert!(registry.register("openai", dummy_factory()).is_err());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ProviderRegistry::new();
        registry.unregister("nonexistent");
        registry.register("openai", dummy_factory()).unwrap();
        registry.unregister("openai");
        registry.unregister("openai");
        assert!(!registry.has_provider("openai"));
    }

    #[test]
    fn lookup_of_unregistered_provider_fails() {
        let registry = ProviderRegistry::new();
        let err = registry.get_provider("missing", ProviderConfig::default()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ProviderNotFound);
    }
}
