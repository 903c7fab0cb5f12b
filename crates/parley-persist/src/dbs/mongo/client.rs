use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::{Client, Database};
use parley_types::Thread;

use crate::dbs::mongo::repositories::{MongoMessageRepository, MongoThreadRepository};
use crate::error::{PersistError, Result};
use crate::models::{MessageRow, PurgeReport};
use crate::row_store::RowStore;

/// Row store backed by the `messages` and `threads` collections
pub struct MongoRowStore {
    db: Database,
    message_repo: MongoMessageRepository,
    thread_repo: MongoThreadRepository,
}

impl MongoRowStore {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self::from_database(client.database(database)))
    }

    pub fn from_database(db: Database) -> Self {
        let message_repo = MongoMessageRepository::new(&db);
        let thread_repo = MongoThreadRepository::new(&db);

        Self {
            db,
            message_repo,
            thread_repo,
        }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.message_repo.ensure_indexes().await?;
        self.thread_repo.ensure_indexes().await?;
        Ok(())
    }
}

#[async_trait]
impl RowStore for MongoRowStore {
    async fn insert_message(&self, row: MessageRow) -> Result<()> {
        self.message_repo.save_message(row.into()).await
    }

    async fn count_messages(&self, thread_id: &str) -> Result<u64> {
        self.message_repo.count_messages(thread_id).await
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let thread = self.thread_repo.get_thread(thread_id).await?;
        Ok(thread.map(Into::into))
    }

    async fn upsert_thread(&self, thread: Thread) -> Result<()> {
        self.thread_repo.upsert_thread(thread).await
    }

    async fn recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageRow>> {
        let messages = self.message_repo.recent_messages(thread_id, limit).await?;
        Ok(messages.into_iter().map(Into::into).collect())
    }

    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<Thread>> {
        let threads = self.thread_repo.list_threads(user_id).await?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn first_user_message(&self, thread_id: &str) -> Result<Option<MessageRow>> {
        let message = self.message_repo.first_user_message(thread_id).await?;
        Ok(message.map(Into::into))
    }

    async fn delete_messages(&self, thread_id: &str) -> Result<u64> {
        self.message_repo.delete_messages(thread_id).await
    }

    async fn delete_thread_row(&self, thread_id: &str) -> Result<u64> {
        self.thread_repo.delete_thread(thread_id).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        let messages_deleted = self.message_repo.delete_created_before(cutoff).await?;
        let threads_deleted = self.thread_repo.delete_inactive_before(cutoff).await?;
        Ok(PurgeReport {
            messages_deleted,
            threads_deleted,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
