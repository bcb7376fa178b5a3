//! OpenRouter provider implementation.

use super::sse::{self, ChatCompletionRequest};
use super::{ChatProvider, ChatStream, ProviderError};
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;

/// OpenRouter API base URL.
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    api_key: String,
    referer: String,
    title: String,
    base_url: String,
    client: Client,
}

impl OpenRouterProvider {
    /// Create a provider from a credential and the attribution identity
    /// OpenRouter expects in `HTTP-Referer` / `X-Title`.
    pub fn new(api_key: String, referer: String, title: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            referer,
            title,
            base_url: OPENROUTER_API_BASE.to_string(),
            client,
        }
    }

    /// Point the adapter at a different endpoint, for local test servers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
    ) -> Result<ChatStream, ProviderError> {
        let request = ChatCompletionRequest {
            model: model_id,
            messages,
            stream: true,
            max_tokens: None,
        };

        tracing::debug!(
            model = %model_id,
            message_count = messages.len(),
            "Starting streaming request to OpenRouter"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(sse::error_from_response(self.name(), response).await);
        }

        Ok(sse::spawn_delta_relay(self.name(), response))
    }
}
