//! Chat turn orchestration and the other chat-level operations.

use crate::models::{BiasReport, ChatSession, ReportFindings};
use crate::services::chat_locks::ChatLocks;
use crate::services::database::{ChatStore, ChatSummary};
use crate::services::extractor::{extract_report, Extraction};
use crate::services::model_reply::{ModelReplyService, FALLBACK_REPLY};
use crate::services::storage::ObjectStore;
use chrono::Utc;
use metrics::counter;
use service_core::error::AppError;
use std::sync::Arc;

/// Document text used when an attached file cannot be read.
pub const FILE_READ_PLACEHOLDER: &str = "Error reading file content";

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub findings: ReportFindings,
    /// Set when a report was persisted for this turn.
    pub report_id: Option<String>,
    pub chat: ChatSession,
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    storage: Arc<dyn ObjectStore>,
    model: ModelReplyService,
    locks: ChatLocks,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        storage: Arc<dyn ObjectStore>,
        model: ModelReplyService,
    ) -> Self {
        Self {
            store,
            storage,
            model,
            locks: ChatLocks::new(),
        }
    }

    /// Run one turn: read the attached file, ask the model, split off the
    /// report, then append both messages and persist.
    ///
    /// The chat is written before the report. The model call happens outside
    /// the per-chat lock; only the read-append-write section is serialized.
    #[tracing::instrument(skip(self, message, file_url))]
    pub async fn run_turn(
        &self,
        user_id: &str,
        chat_id: &str,
        message: &str,
        file_url: Option<&str>,
    ) -> Result<TurnOutcome, AppError> {
        // Reject foreign chats before spending a download and a model call.
        // Ownership is checked again under the lock.
        if let Some(chat) = self.store.find_chat(chat_id).await? {
            if !chat.is_owned_by(user_id) {
                tracing::warn!(user_id = %user_id, "Turn against a chat owned by another user");
                return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized")));
            }
        }

        let document = match file_url.filter(|url| !url.is_empty()) {
            Some(url) => Some(self.read_document(url).await),
            None => None,
        };

        let Extraction { reply, findings } =
            match self.model.reply(message, document.as_deref()).await {
                Ok(raw) => extract_report(&raw),
                Err(e) => {
                    tracing::warn!(error = %e, "Falling back to canned reply");
                    counter!("model_fallbacks_total").increment(1);
                    Extraction {
                        reply: FALLBACK_REPLY.to_string(),
                        findings: ReportFindings::default(),
                    }
                }
            };

        let _guard = self.locks.lock(chat_id).await;

        let now = Utc::now();
        let mut chat = match self.store.find_chat(chat_id).await? {
            Some(chat) if chat.is_owned_by(user_id) => chat,
            Some(_) => {
                tracing::warn!(user_id = %user_id, "Turn against a chat owned by another user");
                return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized")));
            }
            None => ChatSession::new(chat_id.to_string(), user_id.to_string(), now),
        };

        chat.append_turn(message, &reply, now);
        self.store.save_chat(&chat).await?;

        let report_id = if findings.bias_detected {
            let report = BiasReport::new(
                user_id.to_string(),
                chat_id.to_string(),
                findings.clone(),
                now,
            );
            self.store.insert_report(&report).await?;
            counter!("bias_reports_total").increment(1);
            tracing::info!(report_id = %report.id, reasons = report.reasons.len(), "Bias report stored");
            Some(report.id)
        } else {
            None
        };

        counter!("chat_turns_total").increment(1);
        tracing::info!(
            messages = chat.messages.len(),
            bias_detected = findings.bias_detected,
            "Chat turn completed"
        );

        Ok(TurnOutcome {
            reply,
            findings,
            report_id,
            chat,
        })
    }

    /// Fetch the attached file as text. Never fails: unreadable files become
    /// [`FILE_READ_PLACEHOLDER`].
    async fn read_document(&self, file_url: &str) -> String {
        let Some(key) = self.storage.key_from_url(file_url) else {
            tracing::warn!(file_url = %file_url, "File URL does not belong to the object store");
            return FILE_READ_PLACEHOLDER.to_string();
        };

        match self.storage.download(&key).await {
            Ok(bytes) => decode_lossy(&bytes),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to download attached file");
                FILE_READ_PLACEHOLDER.to_string()
            }
        }
    }

    /// Create an empty chat and return its id.
    pub async fn new_chat(&self, user_id: &str) -> Result<String, AppError> {
        let chat = ChatSession::new(uuid::Uuid::new_v4().to_string(), user_id.to_string(), Utc::now());
        self.store.insert_chat(&chat).await?;
        tracing::info!(chat_id = %chat.id, "Chat created");
        Ok(chat.id)
    }

    pub async fn get_chat(&self, user_id: &str, chat_id: &str) -> Result<ChatSession, AppError> {
        self.owned_chat(user_id, chat_id).await
    }

    /// Delete a chat and its reports, reports first.
    pub async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<(), AppError> {
        let _guard = self.locks.lock(chat_id).await;
        self.owned_chat(user_id, chat_id).await?;

        let reports = self.store.delete_reports_for_chat(chat_id).await?;
        self.store.delete_chat(chat_id).await?;

        tracing::info!(chat_id = %chat_id, reports_deleted = reports, "Chat deleted");
        Ok(())
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        self.store.list_chats(user_id).await
    }

    async fn owned_chat(&self, user_id: &str, chat_id: &str) -> Result<ChatSession, AppError> {
        let chat = self
            .store
            .find_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Chat not found")))?;

        if !chat.is_owned_by(user_id) {
            return Err(AppError::Forbidden(anyhow::anyhow!("Unauthorized")));
        }
        Ok(chat)
    }
}

/// UTF-8 decode that drops invalid sequences instead of substituting them.
fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_dropped() {
        let bytes = [b'a', 0xff, b'b', 0xc3, 0xa9, 0xfe];
        assert_eq!(decode_lossy(&bytes), "abé");
    }
}
