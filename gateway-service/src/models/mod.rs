pub mod account;
pub mod conversation;
pub mod message;
pub mod usage;

pub use account::Account;
pub use conversation::{AgentBinding, ChannelInfo, Conversation, ConversationKind};
pub use message::{ChatMessage, Role, SenderType, StoredMessage};
pub use usage::UsageRecord;
