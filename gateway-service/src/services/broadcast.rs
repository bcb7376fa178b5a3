//! Channel broadcaster: non-interactive generation for scheduled posts.
//!
//! Runs the same adapter pipeline as the relay but collects the chunks
//! into one string and persists the result as a channel message instead of
//! streaming it to a live client. Broadcasts are not charged against a
//! per-user balance; the persisted message still carries its token usage.

use crate::models::{ChatMessage, ConversationKind, Role, StoredMessage};
use crate::services::metrics;
use crate::services::tokens::{calculate_cost, estimate_tokens};
use crate::startup::AppState;
use futures::StreamExt;
use service_core::error::AppError;
use uuid::Uuid;

/// Generate and persist a post about `topic` in the given channel.
///
/// The channel must exist, be of the broadcast kind and have exactly one
/// bound agent; anything else fails before the provider is contacted.
pub async fn broadcast_channel_message(
    state: &AppState,
    channel_id: &str,
    topic: &str,
) -> Result<StoredMessage, AppError> {
    let conversation_id = Uuid::parse_str(channel_id)
        .map_err(|_| AppError::NotFound(anyhow::anyhow!("Channel not found: {}", channel_id)))?;

    let channel = state
        .store
        .find_channel(conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Channel not found: {}", channel_id)))?;

    if channel.conversation.parsed_kind() != Some(ConversationKind::Channel) {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "Conversation {} is not a broadcast channel",
            channel_id
        )));
    }

    let agent = match channel.agents.as_slice() {
        [agent] => agent,
        [] => {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "No agent is bound to channel {}",
                channel_id
            )))
        }
        _ => {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Channel {} has more than one bound agent",
                channel_id
            )))
        }
    };

    let adapter = state.registry.resolve(&agent.provider)?;

    let prompt = format!(
        "Generate a high-quality channel post about: {}. \
         Use markdown, emojis, and keep it engaging. \
         The post should be professional and informative.",
        topic
    );
    let messages = vec![ChatMessage {
        role: Role::User,
        content: prompt,
    }];

    let mut chunks = adapter
        .stream_chat(&messages, &agent.model_id)
        .await
        .map_err(|e| {
            metrics::record_provider_error(&agent.provider, e.kind());
            AppError::BadGateway(e.to_string())
        })?;

    let mut content = String::new();
    while let Some(chunk_result) = chunks.next().await {
        match chunk_result {
            Ok(chunk) => content.push_str(&chunk),
            Err(e) => {
                metrics::record_provider_error(&agent.provider, e.kind());
                return Err(AppError::BadGateway(e.to_string()));
            }
        }
    }

    let tokens = estimate_tokens(&content);
    let cost = calculate_cost(tokens, &agent.model_id, state.config.billing.cost_per_1k_tokens);

    tracing::info!(
        channel_id = %conversation_id,
        agent_id = %agent.agent_id,
        provider = %agent.provider,
        model = %agent.model_id,
        tokens = tokens,
        cost = %cost,
        "Broadcast generated"
    );
    metrics::record_tokens(&agent.provider, &agent.model_id, 0, tokens);
    metrics::record_chat_request(&agent.provider, &agent.model_id, "broadcast");

    state
        .store
        .append_agent_message(conversation_id, agent.agent_id, &content, tokens)
        .await
}
