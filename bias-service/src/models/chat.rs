//! Chat session model: one document per chat, holding the full message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Older records store the model's turns as `ai`.
    #[serde(alias = "ai")]
    Assistant,
}

/// A single message. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// RFC 3339 timestamp shared by both messages of a turn.
    pub timestamp: DateTime<Utc>,
}

/// A conversation owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    /// Conversation order; never reordered.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Text of the most recent user message, shown in history listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session.
    pub fn new(id: String, user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            messages: Vec::new(),
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Append one turn: the user's message followed by the assistant's
    /// reply, both stamped with `at`.
    pub fn append_turn(&mut self, user_message: &str, reply: &str, at: DateTime<Utc>) {
        self.messages.push(Message {
            role: Role::User,
            content: user_message.to_string(),
            timestamp: at,
        });
        self.messages.push(Message {
            role: Role::Assistant,
            content: reply.to_string(),
            timestamp: at,
        });
        self.last_message = Some(user_message.to_string());
        self.updated_at = at;
    }
}
