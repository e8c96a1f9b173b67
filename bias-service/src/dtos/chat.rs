use crate::models::{ChatSession, Message, ReportFindings};
use crate::services::{ChatSummary, TurnOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "chatId is required"))]
    pub chat_id: String,

    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedChat {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub report: ReportFindings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    pub updated_chat: UpdatedChat,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            reply: outcome.reply,
            report: outcome.findings,
            report_id: outcome.report_id,
            updated_chat: UpdatedChat {
                id: outcome.chat.id,
                messages: outcome.chat.messages,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetailResponse {
    pub id: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatSession> for ChatDetailResponse {
    fn from(chat: ChatSession) -> Self {
        Self {
            id: chat.id,
            messages: chat.messages,
            last_message: chat.last_message,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteChatResponse {
    pub success: bool,
}

/// Placeholder shown for chats that have no messages yet.
pub const EMPTY_CHAT_LABEL: &str = "New chat";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub chat_id: String,
    pub last_message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatSummary> for HistoryEntry {
    fn from(summary: ChatSummary) -> Self {
        Self {
            chat_id: summary.id,
            last_message: summary
                .last_message
                .unwrap_or_else(|| EMPTY_CHAT_LABEL.to_string()),
            created_at: summary.created_at,
        }
    }
}
