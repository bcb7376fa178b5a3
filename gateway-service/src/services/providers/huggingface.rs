//! Hugging Face Inference API provider implementation.

use super::sse::{self, ChatCompletionRequest};
use super::{ChatProvider, ChatStream, ProviderError};
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;

/// Hugging Face Inference API base URL.
const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co";

/// Hosted inference rejects unbounded generations, so the request carries
/// an explicit output cap.
const MAX_OUTPUT_TOKENS: u32 = 500;

pub struct HuggingFaceProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl HuggingFaceProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            base_url: HUGGINGFACE_API_BASE.to_string(),
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
impl ChatProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
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
            max_tokens: Some(MAX_OUTPUT_TOKENS),
        };

        tracing::debug!(
            model = %model_id,
            message_count = messages.len(),
            "Starting streaming request to Hugging Face"
        );

        let response = self
            .client
            .post(format!(
                "{}/models/{}/v1/chat/completions",
                self.base_url, model_id
            ))
            .bearer_auth(&self.api_key)
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
