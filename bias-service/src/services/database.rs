//! Chat and report persistence.
//!
//! `ChatStore` is the seam the orchestrator and handlers talk to;
//! `MongoChatStore` is the production implementation.

use crate::models::{BiasReport, ChatSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, IndexOptions, ReplaceOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde::Deserialize;
use service_core::error::AppError;

const CHATS: &str = "chats";
const REPORTS: &str = "reports";

/// Projection of a chat used for history listings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatSession> for ChatSummary {
    fn from(chat: &ChatSession) -> Self {
        Self {
            id: chat.id.clone(),
            last_message: chat.last_message.clone(),
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatSession>, AppError>;

    async fn insert_chat(&self, chat: &ChatSession) -> Result<(), AppError>;

    /// Write the full session, creating it when absent.
    async fn save_chat(&self, chat: &ChatSession) -> Result<(), AppError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), AppError>;

    /// Chats owned by `user_id`, most recently updated first.
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError>;

    async fn insert_report(&self, report: &BiasReport) -> Result<(), AppError>;

    async fn find_report(&self, report_id: &str) -> Result<Option<BiasReport>, AppError>;

    /// Returns the number of reports removed.
    async fn delete_reports_for_chat(&self, chat_id: &str) -> Result<u64, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct MongoChatStore {
    client: MongoClient,
    db: Database,
}

impl MongoChatStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for bias-service");

        let chat_owner_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "updated_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_updated_idx".to_string())
                    .build(),
            )
            .build();

        self.chats()
            .create_index(chat_owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create chat owner index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let report_chat_index = IndexModel::builder()
            .keys(doc! { "chat_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("chat_id_idx".to_string())
                    .build(),
            )
            .build();

        self.reports()
            .create_index(report_chat_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create report chat_id index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    fn chats(&self) -> Collection<ChatSession> {
        self.db.collection(CHATS)
    }

    fn reports(&self) -> Collection<BiasReport> {
        self.db.collection(REPORTS)
    }
}

#[async_trait]
impl ChatStore for MongoChatStore {
    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatSession>, AppError> {
        Ok(self.chats().find_one(doc! { "_id": chat_id }, None).await?)
    }

    async fn insert_chat(&self, chat: &ChatSession) -> Result<(), AppError> {
        self.chats().insert_one(chat, None).await?;
        Ok(())
    }

    async fn save_chat(&self, chat: &ChatSession) -> Result<(), AppError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.chats()
            .replace_one(doc! { "_id": &chat.id }, chat, options)
            .await?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), AppError> {
        self.chats().delete_one(doc! { "_id": chat_id }, None).await?;
        Ok(())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "updated_at": -1 })
            .projection(doc! { "last_message": 1, "created_at": 1, "updated_at": 1 })
            .build();

        let cursor = self
            .db
            .collection::<ChatSummary>(CHATS)
            .find(doc! { "user_id": user_id }, options)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn insert_report(&self, report: &BiasReport) -> Result<(), AppError> {
        self.reports().insert_one(report, None).await?;
        Ok(())
    }

    async fn find_report(&self, report_id: &str) -> Result<Option<BiasReport>, AppError> {
        Ok(self.reports().find_one(doc! { "_id": report_id }, None).await?)
    }

    async fn delete_reports_for_chat(&self, chat_id: &str) -> Result<u64, AppError> {
        let result = self
            .reports()
            .delete_many(doc! { "chat_id": chat_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}
