//! Usage tracking for settled generation requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A record of token usage and the cost charged for one relay invocation.
/// Written exactly once, inside the same transaction that decrements the
/// account balance, and immutable afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsageRecord {
    pub usage_id: Uuid,
    pub account_id: String,
    pub tokens_used: i64,
    pub cost: Decimal,
    pub provider: String,
    pub model_id: String,
    /// The persisted agent message carrying the generated content.
    pub message_id: Uuid,
    pub created_utc: DateTime<Utc>,
}
