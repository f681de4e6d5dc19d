//! OpenAI-compatible streaming chat backend.
//!
//! Every supported provider exposes an OpenAI-compatible
//! `/chat/completions` endpoint, so one client serves them all.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use colloquy_core::defaults::PROVIDER_TIMEOUT_SECS;
use colloquy_core::{ChatTurn, Error, Result};

use super::error::{classify_response, classify_transport};
use super::streaming::parse_sse_stream;
use super::types::{ChatCompletionRequest, ChatMessage};
use crate::catalog::ModelInfo;
use crate::chat::{ChatBackend, ProviderFailure, TokenStream};
use crate::provider::{ProviderConfig, ProviderRegistry};
use crate::selector::FailureKind;

/// Streams chat completions from whichever provider hosts the model.
pub struct OpenAiCompatBackend {
    client: Client,
    registry: ProviderRegistry,
}

impl OpenAiCompatBackend {
    pub fn new(registry: ProviderRegistry, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai_compat",
            timeout_secs = timeout.as_secs(),
            "Initializing chat backend"
        );

        Ok(Self { client, registry })
    }

    /// Backend with the default provider timeout.
    pub fn with_registry(registry: ProviderRegistry) -> Result<Self> {
        Self::new(registry, Duration::from_secs(PROVIDER_TIMEOUT_SECS))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn build_request(&self, config: &ProviderConfig, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", config.base_url.trim_end_matches('/'), endpoint);
        self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend {
    async fn stream_chat(
        &self,
        model: &ModelInfo,
        messages: &[ChatTurn],
    ) -> std::result::Result<TokenStream, ProviderFailure> {
        let config = self.registry.get(model.provider).ok_or_else(|| {
            ProviderFailure::new(
                FailureKind::AuthError,
                format!("provider {} has no credentials", model.provider),
            )
        })?;

        debug!(
            subsystem = "inference",
            component = "openai_compat",
            op = "stream_chat",
            model = %model.id,
            provider = %model.provider,
            message_count = messages.len(),
            "Opening chat stream"
        );

        let request = ChatCompletionRequest {
            model: model.id.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            stream: true,
        };

        let response = self
            .build_request(config, "/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProviderFailure::new(classify_transport(&e), format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (kind, message) = classify_response(status.as_u16(), &body);
            return Err(ProviderFailure::new(
                kind,
                format!("{} returned {}: {}", model.provider, status, message),
            ));
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }
}
