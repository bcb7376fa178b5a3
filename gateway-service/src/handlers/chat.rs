//! Chat relay endpoint.

use crate::services::relay::{self, ChatRequest};
use crate::startup::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;

/// `POST /api/chat` — relay a chat completion as server-sent events.
///
/// Failures detected before the stream opens (missing fields, the credit
/// gate, provider resolution) return a JSON error with a non-2xx status;
/// after that the response is committed and failures arrive in-band.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let stream = relay::stream_chat_completion(state, request).await?;

    Ok(([(header::CACHE_CONTROL, "no-cache")], Sse::new(stream)))
}
