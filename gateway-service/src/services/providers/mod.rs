//! AI provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction over chat-completion
//! providers, allowing the relay to swap between backends (OpenRouter,
//! Hugging Face, mock) selected by name at request time.

pub mod huggingface;
pub mod mock;
pub mod openrouter;
pub mod registry;
pub mod sse;

use crate::models::ChatMessage;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

pub use registry::ProviderRegistry;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short classification label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiError(_) => "api",
            Self::RateLimited(_) => "rate_limited",
            Self::NetworkError(_) => "network",
        }
    }
}

/// Incremental text fragments from an in-flight generation. Fragments
/// arrive in generation order, each delivered at most once; an `Err` item
/// ends the stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// A chat-completion backend.
///
/// Implementations differ in endpoint, credentials and request framing;
/// they all stream OpenAI-dialect server-sent events which are decoded by
/// the shared [`sse`] machinery.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name as used for routing and in logs.
    fn name(&self) -> &'static str;

    /// Start a streaming completion for the given transcript.
    ///
    /// A non-success upstream status is returned as an error here, before
    /// any chunk is produced; failures after the upstream stream opens are
    /// delivered as `Err` items on the returned stream. Neither path
    /// panics across this boundary.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
    ) -> Result<ChatStream, ProviderError>;
}
