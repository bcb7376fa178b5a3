//! Channel broadcast endpoint.

use crate::models::StoredMessage;
use crate::services::broadcast;
use crate::startup::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Body of `POST /api/channels/broadcast`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub message: StoredMessage,
}

/// `POST /api/channels/broadcast` — generate and persist a channel post.
pub async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, AppError> {
    let (channel_id, topic) = match (request.channel_id, request.topic) {
        (Some(c), Some(t)) if !c.is_empty() && !t.is_empty() => (c, t),
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing required fields: channelId and topic are required"
            )))
        }
    };

    let message = broadcast::broadcast_channel_message(&state, &channel_id, &topic).await?;

    Ok(Json(BroadcastResponse {
        success: true,
        message,
    }))
}
