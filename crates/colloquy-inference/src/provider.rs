//! Provider credentials loaded from the environment.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::catalog::{ModelCatalog, Provider};

/// Connection settings of one enabled provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Providers with credentials. A provider without a key is disabled and its
/// models are removed from the effective catalog.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `<PROVIDER>_API_KEY` and optional `<PROVIDER>_BASE_URL` for every
    /// known provider. Never fails.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut registry = Self::new();
        for provider in Provider::ALL {
            match lookup(provider.api_key_env()).filter(|k| !k.trim().is_empty()) {
                Some(api_key) => {
                    let base_url = lookup(provider.base_url_env())
                        .filter(|u| !u.trim().is_empty())
                        .unwrap_or_else(|| provider.default_base_url().to_string());
                    registry = registry.with_provider(provider, api_key, base_url);
                }
                None => {
                    warn!(
                        subsystem = "inference",
                        component = "providers",
                        provider = %provider,
                        "{} not set, provider disabled",
                        provider.api_key_env()
                    );
                }
            }
        }
        info!(
            subsystem = "inference",
            component = "providers",
            enabled = registry.providers.len(),
            "Provider registry loaded"
        );
        registry
    }

    pub fn with_provider(
        mut self,
        provider: Provider,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        self.providers.insert(
            provider,
            ProviderConfig {
                api_key: api_key.into(),
                base_url: base_url.into(),
            },
        );
        self
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    pub fn get(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.get(&provider)
    }

    /// Providers without credentials.
    pub fn disabled(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| !self.is_enabled(*p))
            .collect()
    }

    /// The catalog restricted to enabled providers.
    pub fn apply(&self, catalog: &ModelCatalog) -> ModelCatalog {
        catalog.without_providers(&self.disabled())
    }
}
