//! Persistent storage behind the gateway: accounts, usage records,
//! conversations and messages.
//!
//! The trait is the seam to the ledger collaborator: simple reads plus one
//! atomic settlement operation. `PgStore` is the production backend;
//! `MemoryStore` backs tests and keyless local development.

pub mod memory;
pub mod postgres;

use crate::models::{Account, ChannelInfo, StoredMessage, UsageRecord};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Everything needed to settle one relay invocation.
#[derive(Debug, Clone)]
pub struct SettlementInput {
    pub account_id: String,
    pub provider: String,
    pub model_id: String,
    pub tokens_used: i64,
    pub cost: Decimal,
    /// Accumulated response content, persisted as an agent message.
    pub response_content: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch an account, creating it with the given starting balance if it
    /// does not exist yet.
    async fn get_or_create_account(
        &self,
        account_id: &str,
        starting_balance: Decimal,
    ) -> Result<Account, AppError>;

    /// Fetch an account without creating it.
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError>;

    /// Settle one relay invocation: decrement the account balance by the
    /// cost and append a usage record wrapping the response content in a
    /// persisted message (inside an ad-hoc private conversation), as a
    /// single all-or-nothing unit.
    async fn settle(&self, input: &SettlementInput) -> Result<UsageRecord, AppError>;

    /// Usage records for an account, newest first.
    async fn list_usage(&self, account_id: &str) -> Result<Vec<UsageRecord>, AppError>;

    /// Look up a conversation and its agent bindings.
    async fn find_channel(&self, conversation_id: Uuid) -> Result<Option<ChannelInfo>, AppError>;

    /// Append an agent-authored message to a conversation.
    async fn append_agent_message(
        &self,
        conversation_id: Uuid,
        agent_id: Uuid,
        content: &str,
        token_usage: i64,
    ) -> Result<StoredMessage, AppError>;

    /// Check storage health.
    async fn health_check(&self) -> Result<(), AppError>;
}
