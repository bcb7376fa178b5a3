//! Mock provider implementation for tests and keyless local development.

use super::{ChatProvider, ChatStream, ProviderError};
use crate::models::ChatMessage;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Streams a fixed three-chunk response and counts invocations, so tests
/// can assert both stream contents and whether the adapter was reached.
#[derive(Default)]
pub struct MockChatProvider {
    calls: AtomicUsize,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `stream_chat` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn stream_chat(
        &self,
        _messages: &[ChatMessage],
        _model_id: &str,
    ) -> Result<ChatStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let chunks: Vec<Result<String, ProviderError>> = vec![
            Ok("Mock".to_string()),
            Ok(" streaming".to_string()),
            Ok(" response".to_string()),
        ];

        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}
