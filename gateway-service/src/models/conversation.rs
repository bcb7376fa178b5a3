//! Conversations, channels and their agent bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Conversation kinds. A channel is a conversation with read-only
/// semantics toward ordinary participants; only its bound agent posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
    Channel,
}

impl ConversationKind {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub kind: String,
    pub title: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Conversation {
    /// Get parsed conversation kind.
    pub fn parsed_kind(&self) -> Option<ConversationKind> {
        match self.kind.as_str() {
            "private" => Some(ConversationKind::Private),
            "group" => Some(ConversationKind::Group),
            "channel" => Some(ConversationKind::Channel),
            _ => None,
        }
    }
}

/// An AI agent bound to a conversation: the provider and model that speak
/// on its behalf.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentBinding {
    pub agent_id: Uuid,
    pub conversation_id: Uuid,
    pub provider: String,
    pub model_id: String,
}

/// A conversation together with its agent bindings, as returned by channel
/// lookup.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub conversation: Conversation,
    pub agents: Vec<AgentBinding>,
}
