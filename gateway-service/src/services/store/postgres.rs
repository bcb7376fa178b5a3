//! PostgreSQL storage backend.

use super::{SettlementInput, Store};
use crate::models::{
    Account, AgentBinding, ChannelInfo, Conversation, ConversationKind, SenderType, StoredMessage,
    UsageRecord,
};
use crate::services::metrics;
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "gateway-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, starting_balance), fields(account_id = %account_id))]
    async fn get_or_create_account(
        &self,
        account_id: &str,
        starting_balance: Decimal,
    ) -> Result<Account, AppError> {
        let started = Instant::now();

        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(starting_balance)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create account: {}", e)))?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, balance, created_utc
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch account: {}", e)))?;

        metrics::record_db_operation("get_or_create_account", started.elapsed().as_secs_f64());

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, balance, created_utc
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch account: {}", e)))?;

        Ok(account)
    }

    /// The decrement and the usage append commit or roll back together;
    /// the balance update is a transactional read-modify-write, so
    /// concurrent settlements against one account serialize on the row
    /// lock and apply correct sequential arithmetic.
    #[instrument(
        skip(self, input),
        fields(account_id = %input.account_id, tokens = input.tokens_used)
    )]
    async fn settle(&self, input: &SettlementInput) -> Result<UsageRecord, AppError> {
        let started = Instant::now();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance - $2
            WHERE account_id = $1
            "#,
        )
        .bind(&input.account_id)
        .bind(input.cost)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to decrement balance: {}", e))
        })?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Account {} does not exist",
                input.account_id
            )));
        }

        let conversation_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO conversations (conversation_id, kind)
            VALUES ($1, $2)
            "#,
        )
        .bind(conversation_id)
        .bind(ConversationKind::Private.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create conversation: {}", e))
        })?;

        let message_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO messages (message_id, conversation_id, sender_type, content, token_usage)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(SenderType::Agent.as_str())
        .bind(&input.response_content)
        .bind(input.tokens_used)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to persist message: {}", e)))?;

        let usage = sqlx::query_as::<_, UsageRecord>(
            r#"
            INSERT INTO usage_records
                (usage_id, account_id, tokens_used, cost, provider, model_id, message_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING usage_id, account_id, tokens_used, cost, provider, model_id, message_id, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.account_id)
        .bind(input.tokens_used)
        .bind(input.cost)
        .bind(&input.provider)
        .bind(&input.model_id)
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record usage: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit settlement: {}", e))
        })?;

        metrics::record_db_operation("settle", started.elapsed().as_secs_f64());

        info!(
            account_id = %usage.account_id,
            tokens = usage.tokens_used,
            cost = %usage.cost,
            "Settlement recorded"
        );

        Ok(usage)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn list_usage(&self, account_id: &str) -> Result<Vec<UsageRecord>, AppError> {
        let records = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT usage_id, account_id, tokens_used, cost, provider, model_id, message_id, created_utc
            FROM usage_records
            WHERE account_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list usage: {}", e)))?;

        Ok(records)
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    async fn find_channel(&self, conversation_id: Uuid) -> Result<Option<ChannelInfo>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT conversation_id, kind, title, created_utc
            FROM conversations
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch conversation: {}", e))
        })?;

        let conversation = match conversation {
            Some(c) => c,
            None => return Ok(None),
        };

        let agents = sqlx::query_as::<_, AgentBinding>(
            r#"
            SELECT agent_id, conversation_id, provider, model_id
            FROM conversation_agents
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fetch agents: {}", e)))?;

        Ok(Some(ChannelInfo {
            conversation,
            agents,
        }))
    }

    #[instrument(skip(self, content), fields(conversation_id = %conversation_id))]
    async fn append_agent_message(
        &self,
        conversation_id: Uuid,
        agent_id: Uuid,
        content: &str,
        token_usage: i64,
    ) -> Result<StoredMessage, AppError> {
        let message = sqlx::query_as::<_, StoredMessage>(
            r#"
            INSERT INTO messages
                (message_id, conversation_id, sender_type, agent_id, content, token_usage)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING message_id, conversation_id, sender_type, agent_id, content, token_usage, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(SenderType::Agent.as_str())
        .bind(agent_id)
        .bind(content)
        .bind(token_usage)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to persist message: {}", e)))?;

        Ok(message)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
