//! Shared wire format for OpenAI-dialect chat-completion streams.
//!
//! Every supported provider speaks the same framing: newline-delimited
//! `data: <json>` events carrying `choices[0].delta.content` fragments,
//! terminated by the literal `data: [DONE]` sentinel. The decoding lives
//! here once; adapters only differ in how the request is issued.

use super::{ChatStream, ProviderError};
use crate::models::ChatMessage;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Frame prefix carrying a JSON payload.
const DATA_PREFIX: &str = "data: ";

/// End-of-stream sentinel payload.
const DONE_SENTINEL: &str = "[DONE]";

/// Request body shared by the OpenAI-compatible providers.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Error envelopes vary between providers: OpenRouter nests a message
/// object, Hugging Face returns a bare string.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl ErrorEnvelope {
    fn message(self) -> Option<String> {
        match self.error? {
            ErrorBody::Detailed { message } => Some(message),
            ErrorBody::Plain(message) => Some(message),
        }
    }
}

/// Translate a non-success upstream response into a [`ProviderError`],
/// preferring the provider's own error message over a generic one.
pub async fn error_from_response(
    provider: &'static str,
    response: reqwest::Response,
) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(ErrorEnvelope::message)
        .unwrap_or_else(|| format!("{} API error {}", provider, status));

    if status.as_u16() == 429 {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::ApiError(message)
    }
}

/// Decode an upstream event stream into text fragments.
///
/// The response body is read incrementally, never buffered whole. Each
/// read yields zero or more newline-delimited frames; frames without the
/// `data: ` prefix and empty delta fragments are ignored, the `[DONE]`
/// sentinel closes the stream without emission, and a malformed frame is
/// logged and skipped so one bad frame never aborts the rest of the
/// stream. A network failure mid-read surfaces as a final `Err` item.
pub fn spawn_delta_relay(provider: &'static str, response: reqwest::Response) -> ChatStream {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(newline) = buffer.find('\n') {
                        let line = buffer[..newline].trim().to_string();
                        buffer.drain(..=newline);

                        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                            continue;
                        };
                        if payload == DONE_SENTINEL {
                            return;
                        }

                        match serde_json::from_str::<ChatCompletionChunk>(payload) {
                            Ok(parsed) => {
                                let content = parsed
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|choice| choice.delta.content);
                                if let Some(content) = content {
                                    if content.is_empty() {
                                        continue;
                                    }
                                    if tx.send(Ok(content)).await.is_err() {
                                        // Receiver dropped, stop reading upstream.
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    provider = provider,
                                    error = %e,
                                    "Skipping malformed stream frame"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(ProviderError::NetworkError(e.to_string())))
                        .await;
                    return;
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
