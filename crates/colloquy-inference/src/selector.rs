//! Model selection, cost estimation and failure fallback.
//!
//! Pure functions of the catalog and the request: no I/O and no clock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use colloquy_core::defaults::{
    BALANCED_LONG_INPUT_CHARS, BALANCED_SHORT_INPUT_CHARS, MAX_FALLBACKS, OUTPUT_TOKENS_LONG,
    OUTPUT_TOKENS_MEDIUM, OUTPUT_TOKENS_SHORT, SPEED_PREFERRED_PROVIDER,
};
use colloquy_core::{estimate_tokens, Error, Result, Tier};

use crate::catalog::{ModelCatalog, ModelCategory, ModelFeature, ModelInfo, Provider};

/// Routing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Cost,
    Speed,
    Quality,
    #[default]
    Balanced,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cost => "cost",
            Strategy::Speed => "speed",
            Strategy::Quality => "quality",
            Strategy::Balanced => "balanced",
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cost" => Ok(Strategy::Cost),
            "speed" => Ok(Strategy::Speed),
            "quality" => Ok(Strategy::Quality),
            "balanced" => Ok(Strategy::Balanced),
            other => Err(Error::InvalidInput(format!("unknown strategy '{}'", other))),
        }
    }
}

/// Expected response length, mapped to an output token count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedOutput {
    Short,
    #[default]
    Medium,
    Long,
}

impl ExpectedOutput {
    pub fn tokens(&self) -> u64 {
        match self {
            ExpectedOutput::Short => OUTPUT_TOKENS_SHORT,
            ExpectedOutput::Medium => OUTPUT_TOKENS_MEDIUM,
            ExpectedOutput::Long => OUTPUT_TOKENS_LONG,
        }
    }
}

/// What to do when no model satisfies the required features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFallback {
    /// Fail with [`Error::NoCompatibleModel`].
    Strict,
    /// Drop the reasoning requirement, never vision; then fail.
    #[default]
    RelaxReasoning,
    /// Use the first tier-compatible model regardless of features.
    IgnoreFeatures,
}

impl FromStr for FeatureFallback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(FeatureFallback::Strict),
            "relax_reasoning" => Ok(FeatureFallback::RelaxReasoning),
            "ignore_features" => Ok(FeatureFallback::IgnoreFeatures),
            other => Err(Error::InvalidInput(format!(
                "unknown feature fallback '{}'",
                other
            ))),
        }
    }
}

/// Classified provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimit,
    ContextLimit,
    Unavailable,
    AuthError,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimit => "rate_limit",
            FailureKind::ContextLimit => "context_limit",
            FailureKind::Unavailable => "unavailable",
            FailureKind::AuthError => "auth_error",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Strategy used when the caller does not name one.
    pub default_strategy: Strategy,
    pub feature_fallback: FeatureFallback,
    /// When false, unclassified failures get no replacement model.
    pub fallback_enabled: bool,
    /// Provider preferred by the speed strategy.
    pub speed_provider: Provider,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::default(),
            feature_fallback: FeatureFallback::default(),
            fallback_enabled: true,
            speed_provider: SPEED_PREFERRED_PROVIDER.parse().unwrap_or(Provider::Groq),
        }
    }
}

impl OptimizerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MODEL_STRATEGY` | `balanced` |
    /// | `MODEL_FEATURE_FALLBACK` | `relax_reasoning` |
    /// | `MODEL_FALLBACK_ENABLED` | `true` |
    /// | `MODEL_SPEED_PROVIDER` | `groq` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_strategy: std::env::var("MODEL_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_strategy),
            feature_fallback: std::env::var("MODEL_FEATURE_FALLBACK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.feature_fallback),
            fallback_enabled: std::env::var("MODEL_FALLBACK_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            speed_provider: std::env::var("MODEL_SPEED_PROVIDER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.speed_provider),
        }
    }

    pub fn with_feature_fallback(mut self, policy: FeatureFallback) -> Self {
        self.feature_fallback = policy;
        self
    }

    pub fn with_fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }
}

/// Result of model selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecommendation {
    pub primary: ModelInfo,
    /// At most three, never containing `primary`.
    pub fallbacks: Vec<ModelInfo>,
    /// Estimated cost of the exchange on `primary`, in cents.
    pub estimated_cost_cents: i64,
    /// Human-readable explanation of the choice.
    pub reasoning: String,
}

/// Words that signal a request needing a reasoning model.
static REASONING_TRIGGERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(analy[sz]e|analysis|reason(?:ing)?|explain why|step[- ]by[- ]step|prove|calculate|compare|evaluate|derive)\b",
    )
    .expect("valid regex")
});

/// Name fragments of lightweight model variants.
const LIGHTWEIGHT_MARKERS: &[&str] = &["instant", "flash", "mini", "haiku", "lite", "8b"];

/// Known top-tier models, best first.
const TOP_MODELS: &[&str] = &[
    "o1",
    "claude-3-opus-latest",
    "claude-3-5-sonnet-latest",
    "gpt-4o",
    "gemini-1.5-pro",
];

/// Estimated cost in cents of `input_tokens` in and `output_tokens` out on
/// `model`, rounded up to a whole cent.
pub fn estimate_conversation_cost(model: &ModelInfo, input_tokens: u64, output_tokens: u64) -> i64 {
    let raw = input_tokens as f64 / 1000.0 * model.input_cost_per_1k
        + output_tokens as f64 / 1000.0 * model.output_cost_per_1k;
    // Float error can push an exact integer just above itself.
    (raw - 1e-9).ceil().max(0.0) as i64
}

/// Features the input requires.
pub fn required_features(input: &str, has_attachments: bool) -> Vec<ModelFeature> {
    let mut features = Vec::new();
    if has_attachments {
        features.push(ModelFeature::Vision);
    }
    if REASONING_TRIGGERS.is_match(input) {
        features.push(ModelFeature::Reasoning);
    }
    features
}

/// First element with the greatest key; `Iterator::max_by_key` keeps the last.
fn first_max_by<'a, K: PartialOrd>(
    models: &[&'a ModelInfo],
    key: impl Fn(&ModelInfo) -> K,
) -> Option<&'a ModelInfo> {
    let mut best: Option<(&'a ModelInfo, K)> = None;
    for &m in models {
        let k = key(m);
        let better = best.as_ref().map_or(true, |(_, bk)| k > *bk);
        if better {
            best = Some((m, k));
        }
    }
    best.map(|(m, _)| m)
}

fn cheapest<'a>(models: &[&'a ModelInfo]) -> Option<&'a ModelInfo> {
    first_max_by(models, |m| -m.combined_cost_per_1k())
}

/// Routes requests to catalog models.
pub struct ModelOptimizer {
    catalog: Arc<ModelCatalog>,
    config: OptimizerConfig,
}

impl ModelOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_catalog(Arc::new(ModelCatalog::default_catalog()), config)
    }

    pub fn with_catalog(catalog: Arc<ModelCatalog>, config: OptimizerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Pick a primary model and up to three fallbacks for the input.
    pub fn recommend_for_input(
        &self,
        input: &str,
        has_attachments: bool,
        expected_output: ExpectedOutput,
        tier: Tier,
        strategy: Strategy,
    ) -> Result<ModelRecommendation> {
        let mut required = required_features(input, has_attachments);
        let tier_models: Vec<&ModelInfo> = self
            .catalog
            .get_models_for_tier(tier)
            .into_iter()
            .filter(|m| !m.is_embedding())
            .collect();

        let mut notes = Vec::new();
        let mut candidates: Vec<&ModelInfo> = tier_models
            .iter()
            .copied()
            .filter(|m| m.has_all(&required))
            .collect();

        let mut ignore_features = false;
        if candidates.is_empty() {
            match self.config.feature_fallback {
                FeatureFallback::Strict => {}
                FeatureFallback::RelaxReasoning => {
                    if required.contains(&ModelFeature::Reasoning) {
                        required.retain(|f| *f != ModelFeature::Reasoning);
                        candidates = tier_models
                            .iter()
                            .copied()
                            .filter(|m| m.has_all(&required))
                            .collect();
                        if !candidates.is_empty() {
                            notes.push("reasoning requirement relaxed".to_string());
                        }
                    }
                }
                FeatureFallback::IgnoreFeatures => {
                    candidates = tier_models.clone();
                    ignore_features = !candidates.is_empty();
                    if ignore_features {
                        notes.push("feature requirements ignored".to_string());
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Err(Error::NoCompatibleModel(format!(
                "no model at tier {} supports {:?}",
                tier, required
            )));
        }

        let (primary, why) = if ignore_features {
            (candidates[0], "first tier-compatible model".to_string())
        } else {
            self.select(&candidates, input, strategy)
        };

        let fallbacks = Self::fallbacks_for(primary, &candidates);
        let input_tokens = estimate_tokens(input) as u64;
        let estimated_cost_cents =
            estimate_conversation_cost(primary, input_tokens, expected_output.tokens());

        let mut reasoning = format!(
            "Selected {} ({}) by {} strategy: {}",
            primary.id,
            primary.provider,
            strategy.as_str(),
            why
        );
        if !required.is_empty() {
            reasoning.push_str(&format!("; required features {:?}", required));
        }
        for note in notes {
            reasoning.push_str("; ");
            reasoning.push_str(&note);
        }

        debug!(
            subsystem = "inference",
            component = "optimizer",
            op = "recommend",
            model = %primary.id,
            tier = %tier,
            strategy = strategy.as_str(),
            candidates = candidates.len(),
            fallbacks = fallbacks.len(),
            cost_cents = estimated_cost_cents,
            "Model selected"
        );

        Ok(ModelRecommendation {
            primary: primary.clone(),
            fallbacks,
            estimated_cost_cents,
            reasoning,
        })
    }

    fn select<'a>(
        &self,
        candidates: &[&'a ModelInfo],
        input: &str,
        strategy: Strategy,
    ) -> (&'a ModelInfo, String) {
        // Candidates is non-empty here.
        let first = candidates[0];
        match strategy {
            Strategy::Cost => {
                let m = cheapest(candidates).unwrap_or(first);
                (
                    m,
                    format!("lowest combined cost {:.4}¢/1k", m.combined_cost_per_1k()),
                )
            }
            Strategy::Speed => {
                if let Some(m) = candidates.iter().copied().find(|m| {
                    let id = m.id.to_ascii_lowercase();
                    LIGHTWEIGHT_MARKERS.iter().any(|marker| id.contains(marker))
                }) {
                    return (m, "lightweight variant".to_string());
                }
                if let Some(m) = candidates
                    .iter()
                    .copied()
                    .find(|m| m.provider == self.config.speed_provider)
                {
                    return (m, format!("preferred fast provider {}", m.provider));
                }
                (first, "first compatible model".to_string())
            }
            Strategy::Quality => {
                let reasoning: Vec<&ModelInfo> = candidates
                    .iter()
                    .copied()
                    .filter(|m| m.category == ModelCategory::Reasoning)
                    .collect();
                if let Some(m) = first_max_by(&reasoning, |m| m.tier) {
                    return (m, "reasoning model".to_string());
                }
                for name in TOP_MODELS {
                    if let Some(m) = candidates.iter().copied().find(|m| m.id == *name) {
                        return (m, "top-tier model".to_string());
                    }
                }
                let m = first_max_by(candidates, |m| m.tier).unwrap_or(first);
                (m, "highest tier available".to_string())
            }
            Strategy::Balanced => {
                let len = input.chars().count();
                if len < BALANCED_SHORT_INPUT_CHARS {
                    let (m, why) = self.select(candidates, input, Strategy::Cost);
                    return (m, format!("short input, {}", why));
                }
                if len > BALANCED_LONG_INPUT_CHARS {
                    let (m, why) = self.select(candidates, input, Strategy::Quality);
                    return (m, format!("long input, {}", why));
                }
                if let Some(m) = candidates.iter().copied().find(|m| {
                    matches!(m.tier, Tier::Starter | Tier::Professional) && !m.id.contains("mini")
                }) {
                    return (m, "mid-tier model for medium input".to_string());
                }
                let (m, why) = self.select(candidates, input, Strategy::Cost);
                (m, format!("no mid-tier model, {}", why))
            }
        }
    }

    /// Up to [`MAX_FALLBACKS`] candidates other than `primary`: other
    /// providers first, then ascending combined cost.
    fn fallbacks_for(primary: &ModelInfo, candidates: &[&ModelInfo]) -> Vec<ModelInfo> {
        let mut rest: Vec<&ModelInfo> = candidates
            .iter()
            .copied()
            .filter(|m| m.id != primary.id)
            .collect();
        rest.sort_by(|a, b| {
            let a_same = a.provider == primary.provider;
            let b_same = b.provider == primary.provider;
            a_same
                .cmp(&b_same)
                .then(a.combined_cost_per_1k().total_cmp(&b.combined_cost_per_1k()))
        });
        rest.into_iter().take(MAX_FALLBACKS).cloned().collect()
    }

    /// Replace the primary of `base` with a caller-named model.
    ///
    /// The previous primary joins the front of the fallback list. Errors
    /// when the model is unknown (or its provider disabled), above `tier`,
    /// not a chat model, or missing a feature the input requires.
    pub fn pin_model(
        &self,
        model_id: &str,
        input: &str,
        has_attachments: bool,
        expected_output: ExpectedOutput,
        tier: Tier,
        base: ModelRecommendation,
    ) -> Result<ModelRecommendation> {
        let model = self
            .catalog
            .get(model_id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown model '{}'", model_id)))?;
        if model.tier > tier {
            return Err(Error::Forbidden(format!(
                "model {} requires the {} tier",
                model.id, model.tier
            )));
        }
        if model.is_embedding() {
            return Err(Error::InvalidInput(format!(
                "model {} is an embedding model",
                model.id
            )));
        }
        let missing: Vec<ModelFeature> = required_features(input, has_attachments)
            .into_iter()
            .filter(|f| !model.has_feature(*f))
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "model {} does not support {:?}",
                model.id, missing
            )));
        }

        let fallbacks = std::iter::once(base.primary)
            .chain(base.fallbacks)
            .filter(|m| m.id != model.id)
            .take(MAX_FALLBACKS)
            .collect();
        let estimated_cost_cents = estimate_conversation_cost(
            model,
            estimate_tokens(input) as u64,
            expected_output.tokens(),
        );

        Ok(ModelRecommendation {
            primary: model.clone(),
            fallbacks,
            estimated_cost_cents,
            reasoning: format!("Requested model {} ({})", model.id, model.provider),
        })
    }

    /// Choose a replacement after `failed_model_id` failed with `failure`.
    ///
    /// Never returns the failed model.
    pub fn handle_model_failure(
        &self,
        failed_model_id: &str,
        failure: FailureKind,
        recommendation: &ModelRecommendation,
    ) -> Option<ModelInfo> {
        let pool: Vec<&ModelInfo> = recommendation
            .fallbacks
            .iter()
            .filter(|m| m.id != failed_model_id)
            .collect();

        let failed_provider = self
            .catalog
            .get(failed_model_id)
            .or_else(|| {
                std::iter::once(&recommendation.primary)
                    .chain(recommendation.fallbacks.iter())
                    .find(|m| m.id == failed_model_id)
            })
            .map(|m| m.provider);

        let replacement = match failure {
            FailureKind::RateLimit => pool
                .iter()
                .copied()
                .find(|m| Some(m.provider) != failed_provider),
            FailureKind::ContextLimit => first_max_by(&pool, |m| m.context_length),
            FailureKind::Unavailable => pool.first().copied(),
            FailureKind::AuthError => pool
                .iter()
                .copied()
                .find(|m| matches!(m.tier, Tier::Free | Tier::Starter)),
            FailureKind::Unknown => {
                if self.config.fallback_enabled {
                    pool.first().copied()
                } else {
                    None
                }
            }
        };

        debug!(
            subsystem = "inference",
            component = "optimizer",
            op = "handle_failure",
            model = failed_model_id,
            failure_kind = failure.as_str(),
            replacement = replacement.map(|m| m.id.as_str()).unwrap_or("none"),
            "Fallback decision"
        );

        replacement.cloned()
    }
}
