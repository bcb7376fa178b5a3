//! The streaming relay: orchestrates one end-to-end chat request.
//!
//! Validates the request, enforces the credit gate, resolves the provider
//! adapter, fans each upstream chunk out to the caller while accumulating
//! the full response, and finally settles the cost against the caller's
//! account in a single atomic store transaction.

use crate::models::ChatMessage;
use crate::services::metrics;
use crate::services::store::SettlementInput;
use crate::services::tokens::{calculate_cost, estimate_tokens};
use crate::startup::AppState;
use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Terminal sentinel closing every relayed stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Run the relay for one chat request, returning the event stream for the
/// caller.
///
/// Everything that can be rejected without side effects (validation, the
/// credit gate, provider resolution) happens here, before the stream
/// opens; those failures surface as request-level errors. Once the stream
/// is open, failures become in-band `{"error": …}` events and settlement
/// still runs over whatever was accumulated.
pub async fn stream_chat_completion(
    state: AppState,
    request: ChatRequest,
) -> Result<impl Stream<Item = Result<Event, Infallible>>, AppError> {
    let ChatRequest {
        messages,
        provider,
        model_id,
        account_id,
    } = request;

    let (provider_name, model_id) = match (provider, model_id) {
        (Some(p), Some(m)) if !p.is_empty() && !m.is_empty() && !messages.is_empty() => (p, m),
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required fields: messages, provider and modelId are required"
            )))
        }
    };

    let account_id =
        account_id.unwrap_or_else(|| state.config.billing.default_account.clone());
    let account = state
        .store
        .get_or_create_account(&account_id, state.config.billing.starting_credits)
        .await?;

    if !account.has_credits() {
        return Err(AppError::InsufficientCredits(
            "Insufficient credits. Please top up your account.".to_string(),
        ));
    }

    let adapter = state.registry.resolve(&provider_name)?;

    let input_tokens: i64 = messages.iter().map(|m| estimate_tokens(&m.content)).sum();

    tracing::info!(
        account_id = %account_id,
        provider = %provider_name,
        model = %model_id,
        input_tokens = input_tokens,
        "Starting chat relay"
    );

    let (tx, rx) = mpsc::channel::<Event>(32);
    let store = state.store.clone();
    let rate = state.config.billing.cost_per_1k_tokens;

    tokio::spawn(async move {
        let mut accumulated = String::new();
        let mut client_connected = true;
        let mut stream_failed = false;

        match adapter.stream_chat(&messages, &model_id).await {
            Ok(mut chunks) => {
                while let Some(chunk_result) = chunks.next().await {
                    match chunk_result {
                        Ok(content) => {
                            accumulated.push_str(&content);
                            metrics::record_stream_chunk(&provider_name);

                            let event =
                                Event::default().data(json!({ "content": content }).to_string());
                            if tx.send(event).await.is_err() {
                                // Client went away. Stop reading; dropping the
                                // stream cancels the upstream call.
                                client_connected = false;
                                break;
                            }
                        }
                        Err(e) => {
                            stream_failed = true;
                            tracing::error!(
                                provider = %provider_name,
                                error = %e,
                                "AI provider stream error"
                            );
                            metrics::record_provider_error(&provider_name, e.kind());

                            let event =
                                Event::default().data(json!({ "error": e.to_string() }).to_string());
                            if tx.send(event).await.is_err() {
                                client_connected = false;
                            }
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                stream_failed = true;
                tracing::error!(
                    provider = %provider_name,
                    error = %e,
                    "AI provider request failed"
                );
                metrics::record_provider_error(&provider_name, e.kind());

                let event = Event::default().data(json!({ "error": e.to_string() }).to_string());
                if tx.send(event).await.is_err() {
                    client_connected = false;
                }
            }
        }

        if !client_connected && accumulated.is_empty() {
            // Nothing was generated before the disconnect: no charge.
            tracing::info!(
                account_id = %account_id,
                "Client disconnected before any output; skipping settlement"
            );
            metrics::record_chat_request(&provider_name, &model_id, "client_disconnect");
            return;
        }

        let output_tokens = estimate_tokens(&accumulated);
        let total_tokens = input_tokens + output_tokens;
        let cost = calculate_cost(total_tokens, &model_id, rate);

        let settlement = SettlementInput {
            account_id: account_id.clone(),
            provider: provider_name.clone(),
            model_id: model_id.clone(),
            tokens_used: total_tokens,
            cost,
            response_content: accumulated,
        };

        if let Err(e) = store.settle(&settlement).await {
            tracing::error!(
                account_id = %account_id,
                error = %e,
                "Failed to settle usage"
            );
        }

        metrics::record_tokens(&provider_name, &model_id, input_tokens, output_tokens);
        let outcome = if stream_failed {
            "upstream_error"
        } else if client_connected {
            "ok"
        } else {
            "client_disconnect"
        };
        metrics::record_chat_request(&provider_name, &model_id, outcome);

        if client_connected {
            let _ = tx.send(Event::default().data(DONE_SENTINEL)).await;
        }
    });

    Ok(ReceiverStream::new(rx).map(Ok::<Event, Infallible>))
}
