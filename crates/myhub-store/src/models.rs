//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so the server layer can hand rows to
//! response DTOs without an extra mapping step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use myhub_shared::UserId;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known Discord identity, upserted on every successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// External Discord snowflake, unique.
    pub user_id: UserId,
    /// Display name at last login.
    pub user_name: String,
    /// CDN avatar URL, if the profile has a custom avatar.
    pub user_avatar: Option<String>,
    /// Last address the user logged in from.
    pub ip_address: Option<String>,
    /// Blocked users lose write access and are logged out on their next request.
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub last_login: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Two-valued conversation lifecycle; only an admin may toggle it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ConversationStatus::Open),
            "closed" => Some(ConversationStatus::Closed),
            _ => None,
        }
    }
}

/// A support conversation. Exactly one per non-admin user, enforced by a
/// unique constraint on `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: Uuid,
    /// Owning user's Discord snowflake.
    pub user_id: UserId,
    /// Owner display name snapshot.
    pub user_name: String,
    /// Owner avatar snapshot.
    pub user_avatar: Option<String>,
    /// Text of the most recent message, for list previews.
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: Uuid,
    /// The conversation this message belongs to.
    pub conversation_id: Uuid,
    /// Discord snowflake of the sender.
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    /// Message body; non-empty after trimming.
    pub content: String,
    /// Whether the sender was the configured admin at send time.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a new message with a fresh id and the current timestamp.
    pub fn new(
        conversation_id: Uuid,
        sender_id: UserId,
        sender_name: String,
        sender_avatar: Option<String>,
        content: String,
        is_admin: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            sender_name,
            sender_avatar,
            content,
            is_admin,
            created_at: Utc::now(),
        }
    }
}
