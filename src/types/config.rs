//! Provider configuration and the builder used to assemble it, modeled on the
//! reference gateway's `config::builder::ConfigBuilder` fluent style.

use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything an adapter needs to talk to its provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub region: Option<String>,
    pub base_url: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
}

impl ProviderConfig {
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }
}

/// Fluent builder for [`ProviderConfig`].
#[derive(Debug, Default)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.config.organization = Some(organization.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = Some(max_retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn aws_credentials(mut self, access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        self.config.aws_access_key_id = Some(access_key_id.into());
        self.config.aws_secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn build(self) -> ProviderConfig {
        self.config
    }
}

/// Recognized keys when projecting an untyped credential map (as handed down from a
/// credential vault) onto a [`ProviderConfig`]. Unknown keys are ignored.
pub fn config_from_credentials(credentials: &std::collections::HashMap<String, String>) -> ProviderConfig {
    let mut builder = ProviderConfig::builder();
    if let Some(v) = credentials.get("api_key") {
        builder = builder.api_key(v.clone());
    }
    if let Some(v) = credentials.get("organization") {
        builder = builder.organization(v.clone());
    }
    if let Some(v) = credentials.get("region") {
        builder = builder.region(v.clone());
    }
    if let Some(v) = credentials.get("base_url") {
        builder = builder.base_url(v.clone());
    }
    let access_key = credentials.get("access_key_id").cloned();
    let secret_key = credentials.get("secret_access_key").cloned();
    if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
        builder = builder.aws_credentials(access_key, secret_key);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = ProviderConfig::default();
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn credential_projection_ignores_unknown_keys() {
        let mut creds = std::collections::HashMap::new();
        creds.insert("api_key".to_string(), "sk-test".to_string());
        creds.insert("totally_unknown".to_string(), "x".to_string());
        let config = config_from_credentials(&creds);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert!(config.region.is_none());
    }

    #[test]
    fn aws_credentials_require_both_fields() {
        let mut creds = std::collections::HashMap::new();
        creds.insert("access_key_id".to_string(), "AKIA".to_string());
        let config = config_from_credentials(&creds);
        assert!(config.aws_access_key_id.is_none());
    }
}
