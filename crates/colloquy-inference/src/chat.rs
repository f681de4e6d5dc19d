//! Streaming chat abstraction and fallback retry.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tracing::{info, warn};

use colloquy_core::{ChatTurn, Error, Result};

use crate::catalog::ModelInfo;
use crate::selector::{FailureKind, ModelOptimizer, ModelRecommendation};

/// Stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A provider call that failed before the stream opened.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a token stream for `messages` on `model`.
    async fn stream_chat(
        &self,
        model: &ModelInfo,
        messages: &[ChatTurn],
    ) -> std::result::Result<TokenStream, ProviderFailure>;
}

/// Open a stream on the recommended primary, replacing failed models through
/// [`ModelOptimizer::handle_model_failure`] until one opens or no
/// replacement remains.
///
/// Returns the model that served the stream.
pub async fn open_stream_with_fallback(
    backend: &dyn ChatBackend,
    optimizer: &ModelOptimizer,
    recommendation: &ModelRecommendation,
    messages: &[ChatTurn],
) -> Result<(ModelInfo, TokenStream)> {
    let mut remaining = recommendation.clone();
    let mut model = recommendation.primary.clone();

    loop {
        match backend.stream_chat(&model, messages).await {
            Ok(stream) => {
                if model.id != recommendation.primary.id {
                    info!(
                        subsystem = "inference",
                        component = "chat",
                        op = "fallback",
                        model = %model.id,
                        primary = %recommendation.primary.id,
                        "Serving from fallback model"
                    );
                }
                return Ok((model, stream));
            }
            Err(failure) => {
                warn!(
                    subsystem = "inference",
                    component = "chat",
                    model = %model.id,
                    provider = %model.provider,
                    failure_kind = failure.kind.as_str(),
                    error = %failure.message,
                    "Provider call failed"
                );
                // Each model is tried at most once.
                remaining.fallbacks.retain(|m| m.id != model.id);
                match optimizer.handle_model_failure(&model.id, failure.kind, &remaining) {
                    Some(next) => {
                        remaining.fallbacks.retain(|m| m.id != next.id);
                        model = next;
                    }
                    None => {
                        return Err(Error::Provider(format!(
                            "{} failed ({}) and no fallback remains: {}",
                            model.id, failure.kind, failure.message
                        )));
                    }
                }
            }
        }
    }
}
