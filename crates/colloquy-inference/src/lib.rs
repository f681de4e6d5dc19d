//! # colloquy-inference
//!
//! Model catalog, routing and provider streaming.
//!
//! - [`catalog`]: the static model list with per-tier availability
//! - [`selector`]: strategy-based model selection, cost estimation and
//!   failure fallback
//! - [`provider`]: provider credentials from the environment
//! - [`chat`]: the streaming backend trait and fallback retry
//! - [`openai`]: the OpenAI-compatible HTTP backend

pub mod catalog;
pub mod chat;
pub mod openai;
pub mod provider;
pub mod selector;

pub use catalog::{ModelCatalog, ModelCategory, ModelFeature, ModelInfo, Provider};
pub use chat::{open_stream_with_fallback, ChatBackend, ProviderFailure, TokenStream};
pub use openai::OpenAiCompatBackend;
pub use provider::{ProviderConfig, ProviderRegistry};
pub use selector::{
    estimate_conversation_cost, required_features, ExpectedOutput, FailureKind, FeatureFallback,
    ModelOptimizer, ModelRecommendation, OptimizerConfig, Strategy,
};
