//! In-memory storage backend for tests and keyless local development.

use super::{SettlementInput, Store};
use crate::models::{
    Account, AgentBinding, ChannelInfo, Conversation, ConversationKind, SenderType, StoredMessage,
    UsageRecord,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    conversations: HashMap<Uuid, Conversation>,
    agents: HashMap<Uuid, Vec<AgentBinding>>,
    messages: Vec<StoredMessage>,
    usage: Vec<UsageRecord>,
}

/// All state behind one mutex, so settlements are serialized exactly like
/// the row-locked Postgres transaction they stand in for.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation, returning its id.
    pub async fn create_conversation(
        &self,
        kind: ConversationKind,
        title: Option<&str>,
    ) -> Uuid {
        let conversation_id = Uuid::new_v4();
        let mut state = self.state.lock().await;
        state.conversations.insert(
            conversation_id,
            Conversation {
                conversation_id,
                kind: kind.as_str().to_string(),
                title: title.map(str::to_string),
                created_utc: Utc::now(),
            },
        );
        conversation_id
    }

    /// Bind an agent to a conversation, returning the agent id.
    pub async fn bind_agent(
        &self,
        conversation_id: Uuid,
        provider: &str,
        model_id: &str,
    ) -> Uuid {
        let agent_id = Uuid::new_v4();
        let mut state = self.state.lock().await;
        state.agents.entry(conversation_id).or_default().push(AgentBinding {
            agent_id,
            conversation_id,
            provider: provider.to_string(),
            model_id: model_id.to_string(),
        });
        agent_id
    }

    /// Overwrite an account balance, creating the account if needed.
    pub async fn set_balance(&self, account_id: &str, balance: Decimal) {
        let mut state = self.state.lock().await;
        state
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account {
                account_id: account_id.to_string(),
                balance,
                created_utc: Utc::now(),
            })
            .balance = balance;
    }

    /// All persisted messages in a conversation, in insertion order.
    pub async fn messages_in(&self, conversation_id: Uuid) -> Vec<StoredMessage> {
        let state = self.state.lock().await;
        state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Total number of persisted messages.
    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Look up a persisted message by id.
    pub async fn find_message(&self, message_id: Uuid) -> Option<StoredMessage> {
        let state = self.state.lock().await;
        state
            .messages
            .iter()
            .find(|m| m.message_id == message_id)
            .cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_account(
        &self,
        account_id: &str,
        starting_balance: Decimal,
    ) -> Result<Account, AppError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account {
                account_id: account_id.to_string(),
                balance: starting_balance,
                created_utc: Utc::now(),
            });
        Ok(account.clone())
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(account_id).cloned())
    }

    async fn settle(&self, input: &SettlementInput) -> Result<UsageRecord, AppError> {
        let mut state = self.state.lock().await;

        let account = state.accounts.get_mut(&input.account_id).ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Account {} does not exist",
                input.account_id
            ))
        })?;
        account.balance -= input.cost;

        let conversation_id = Uuid::new_v4();
        state.conversations.insert(
            conversation_id,
            Conversation {
                conversation_id,
                kind: ConversationKind::Private.as_str().to_string(),
                title: None,
                created_utc: Utc::now(),
            },
        );

        let message_id = Uuid::new_v4();
        state.messages.push(StoredMessage {
            message_id,
            conversation_id,
            sender_type: SenderType::Agent.as_str().to_string(),
            agent_id: None,
            content: input.response_content.clone(),
            token_usage: input.tokens_used,
            created_utc: Utc::now(),
        });

        let usage = UsageRecord {
            usage_id: Uuid::new_v4(),
            account_id: input.account_id.clone(),
            tokens_used: input.tokens_used,
            cost: input.cost,
            provider: input.provider.clone(),
            model_id: input.model_id.clone(),
            message_id,
            created_utc: Utc::now(),
        };
        state.usage.push(usage.clone());

        Ok(usage)
    }

    async fn list_usage(&self, account_id: &str) -> Result<Vec<UsageRecord>, AppError> {
        let state = self.state.lock().await;
        let mut records: Vec<UsageRecord> = state
            .usage
            .iter()
            .filter(|u| u.account_id == account_id)
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }

    async fn find_channel(&self, conversation_id: Uuid) -> Result<Option<ChannelInfo>, AppError> {
        let state = self.state.lock().await;
        let conversation = match state.conversations.get(&conversation_id) {
            Some(c) => c.clone(),
            None => return Ok(None),
        };
        let agents = state
            .agents
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        Ok(Some(ChannelInfo {
            conversation,
            agents,
        }))
    }

    async fn append_agent_message(
        &self,
        conversation_id: Uuid,
        agent_id: Uuid,
        content: &str,
        token_usage: i64,
    ) -> Result<StoredMessage, AppError> {
        let mut state = self.state.lock().await;

        if !state.conversations.contains_key(&conversation_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Conversation {} does not exist",
                conversation_id
            )));
        }

        let message = StoredMessage {
            message_id: Uuid::new_v4(),
            conversation_id,
            sender_type: SenderType::Agent.as_str().to_string(),
            agent_id: Some(agent_id),
            content: content.to_string(),
            token_usage,
            created_utc: Utc::now(),
        };
        state.messages.push(message.clone());

        Ok(message)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
