//! Static model catalog.
//!
//! Loaded once at startup and shared read-only. Costs are in cents per 1000
//! tokens.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use colloquy_core::{Error, Result, Tier};

/// Hosted model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    Groq,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Groq => "groq",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// Environment variable overriding the provider's base URL.
    pub fn base_url_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_BASE_URL",
            Provider::Anthropic => "ANTHROPIC_BASE_URL",
            Provider::Google => "GOOGLE_BASE_URL",
            Provider::Groq => "GROQ_BASE_URL",
        }
    }

    /// OpenAI-compatible endpoint of the provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "google" => Ok(Provider::Google),
            "groq" => Ok(Provider::Groq),
            other => Err(Error::InvalidInput(format!("unknown provider '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Chat,
    Vision,
    Code,
    Reasoning,
    Embedding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFeature {
    Vision,
    Json,
    FunctionCalling,
    Streaming,
    Reasoning,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub provider: Provider,
    pub category: ModelCategory,
    /// Context window in tokens.
    pub context_length: u32,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub features: Vec<ModelFeature>,
    /// Minimum subscription tier.
    pub tier: Tier,
}

impl ModelInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        provider: Provider,
        category: ModelCategory,
        context_length: u32,
        input_cost_per_1k: f64,
        output_cost_per_1k: f64,
        features: &[ModelFeature],
        tier: Tier,
    ) -> Self {
        Self {
            id: id.into(),
            provider,
            category,
            context_length,
            input_cost_per_1k,
            output_cost_per_1k,
            features: features.to_vec(),
            tier,
        }
    }

    pub fn has_feature(&self, feature: ModelFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn has_all(&self, features: &[ModelFeature]) -> bool {
        features.iter().all(|f| self.has_feature(*f))
    }

    /// Input plus output cost per 1000 tokens.
    pub fn combined_cost_per_1k(&self) -> f64 {
        self.input_cost_per_1k + self.output_cost_per_1k
    }

    pub fn is_embedding(&self) -> bool {
        self.category == ModelCategory::Embedding
    }
}

/// Immutable set of models with unique ids, in declaration order.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
}

impl ModelCatalog {
    /// Build a catalog, rejecting duplicate ids.
    pub fn new(models: Vec<ModelInfo>) -> Result<Self> {
        let mut seen = HashSet::new();
        for m in &models {
            if !seen.insert(m.id.as_str()) {
                return Err(Error::Config(format!("duplicate model id '{}'", m.id)));
            }
        }
        Ok(Self { models })
    }

    /// Built-in catalog. Every tier has a vision model and a reasoning model.
    pub fn default_catalog() -> Self {
        use ModelCategory::*;
        use ModelFeature::{FunctionCalling as Fc, Json, Reasoning as R, Streaming as S};
        use Provider::*;
        const V: ModelFeature = ModelFeature::Vision;

        let models = vec![
            ModelInfo::new("llama-3.1-8b-instant", Groq, Chat, 131_072, 0.005, 0.008, &[Json, S], Tier::Free),
            ModelInfo::new("gemini-1.5-flash", Google, Vision, 1_000_000, 0.0075, 0.03, &[V, Json, Fc, S], Tier::Free),
            ModelInfo::new("deepseek-r1-distill-llama-70b", Groq, Reasoning, 131_072, 0.075, 0.099, &[R, S], Tier::Free),
            ModelInfo::new("gpt-4o-mini", OpenAi, Chat, 128_000, 0.015, 0.06, &[V, Json, Fc, S], Tier::Starter),
            ModelInfo::new("claude-3-5-haiku-latest", Anthropic, Chat, 200_000, 0.08, 0.4, &[V, Fc, S], Tier::Starter),
            ModelInfo::new("llama-3.3-70b-versatile", Groq, Chat, 131_072, 0.059, 0.079, &[Json, Fc, S], Tier::Starter),
            ModelInfo::new("qwen-2.5-coder-32b", Groq, Code, 131_072, 0.079, 0.079, &[Json, S], Tier::Starter),
            ModelInfo::new("o3-mini", OpenAi, Reasoning, 200_000, 0.11, 0.44, &[R, Json, Fc, S], Tier::Starter),
            ModelInfo::new("gpt-4o", OpenAi, Vision, 128_000, 0.25, 1.0, &[V, Json, Fc, S], Tier::Professional),
            ModelInfo::new("claude-3-5-sonnet-latest", Anthropic, Chat, 200_000, 0.3, 1.5, &[V, Fc, S], Tier::Professional),
            ModelInfo::new("gemini-1.5-pro", Google, Vision, 2_000_000, 0.125, 0.5, &[V, Json, Fc, S], Tier::Professional),
            ModelInfo::new("o1", OpenAi, Reasoning, 200_000, 1.5, 6.0, &[R, V, Fc, S], Tier::Enterprise),
            ModelInfo::new("claude-3-opus-latest", Anthropic, Chat, 200_000, 1.5, 7.5, &[V, Fc, S], Tier::Enterprise),
            ModelInfo::new("text-embedding-3-small", OpenAi, Embedding, 8_191, 0.002, 0.0, &[], Tier::Free),
        ];

        Self { models }
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Every model whose minimum tier is at or below `tier`, catalog order.
    pub fn get_models_for_tier(&self, tier: Tier) -> Vec<&ModelInfo> {
        self.models.iter().filter(|m| m.tier <= tier).collect()
    }

    /// Whether `id` exists and is usable at `tier`.
    pub fn is_available(&self, id: &str, tier: Tier) -> bool {
        self.get(id).is_some_and(|m| m.tier <= tier)
    }

    /// Copy of the catalog without the given providers' models.
    pub fn without_providers(&self, disabled: &[Provider]) -> Self {
        Self {
            models: self
                .models
                .iter()
                .filter(|m| !disabled.contains(&m.provider))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: [Tier; 4] = [Tier::Free, Tier::Starter, Tier::Professional, Tier::Enterprise];

    #[test]
    fn test_default_catalog_ids_unique() {
        let catalog = ModelCatalog::default_catalog();
        assert!(ModelCatalog::new(catalog.models().to_vec()).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let m = ModelInfo::new("x", Provider::OpenAi, ModelCategory::Chat, 1, 0.1, 0.1, &[], Tier::Free);
        let err = ModelCatalog::new(vec![m.clone(), m]).unwrap_err();
        assert!(err.to_string().contains("duplicate model id"));
    }

    #[test]
    fn test_tier_monotonicity() {
        let catalog = ModelCatalog::default_catalog();
        for (i, lower) in TIERS.iter().enumerate() {
            for higher in &TIERS[i..] {
                let small: Vec<&str> = catalog
                    .get_models_for_tier(*lower)
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect();
                let large: Vec<&str> = catalog
                    .get_models_for_tier(*higher)
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect();
                assert!(small.iter().all(|id| large.contains(id)), "{lower} ⊄ {higher}");
            }
        }
    }

    #[test]
    fn test_every_tier_has_vision_and_reasoning() {
        let catalog = ModelCatalog::default_catalog();
        for tier in TIERS {
            let models = catalog.get_models_for_tier(tier);
            assert!(models.iter().any(|m| m.has_feature(ModelFeature::Vision)));
            assert!(models.iter().any(|m| m.has_feature(ModelFeature::Reasoning)));
        }
    }

    #[test]
    fn test_enterprise_sees_everything() {
        let catalog = ModelCatalog::default_catalog();
        assert_eq!(catalog.get_models_for_tier(Tier::Enterprise).len(), catalog.len());
    }

    #[test]
    fn test_is_available() {
        let catalog = ModelCatalog::default_catalog();
        assert!(catalog.is_available("gpt-4o", Tier::Professional));
        assert!(!catalog.is_available("gpt-4o", Tier::Starter));
        assert!(!catalog.is_available("nonexistent", Tier::Enterprise));
    }

    #[test]
    fn test_without_providers() {
        let catalog = ModelCatalog::default_catalog().without_providers(&[Provider::Groq]);
        assert!(catalog.models().iter().all(|m| m.provider != Provider::Groq));
        assert!(catalog.get("gpt-4o").is_some());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("mistral".parse::<Provider>().is_err());
    }
}
