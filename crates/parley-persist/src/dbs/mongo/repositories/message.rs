use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::{Collection, Database, IndexModel};

use crate::dbs::mongo::models::MongoMessage;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MongoMessage>,
}

impl MongoMessageRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.collection("messages");
        Self { collection }
    }

    /// Index backing the per-thread, time-ordered reads
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "thread_id": 1, "created_at": 1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    /// Save a single message
    pub async fn save_message(&self, message: MongoMessage) -> Result<()> {
        self.collection.insert_one(&message).await?;
        Ok(())
    }

    pub async fn count_messages(&self, thread_id: &str) -> Result<u64> {
        let count = self
            .collection
            .count_documents(doc! { "thread_id": thread_id })
            .await?;
        Ok(count)
    }

    /// Most recent `limit` messages, returned oldest first
    pub async fn recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<MongoMessage>> {
        let mut messages: Vec<MongoMessage> = self
            .collection
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn first_user_message(&self, thread_id: &str) -> Result<Option<MongoMessage>> {
        let message = self
            .collection
            .find_one(doc! { "thread_id": thread_id, "role": "user" })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?;
        Ok(message)
    }

    pub async fn delete_messages(&self, thread_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(result.deleted_count)
    }

    pub async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let filter = doc! {
            "created_at": { "$lt": bson::DateTime::from_millis(cutoff.timestamp_millis()) }
        };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
