use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use parley_types::Thread;

use crate::dbs::mongo::models::MongoThread;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoThread>,
}

impl MongoThreadRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.collection("threads");
        Self { collection }
    }

    /// One row per thread id, plus the per-user listing index
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique_thread = IndexModel::builder()
            .keys(doc! { "thread_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_user = IndexModel::builder()
            .keys(doc! { "user_id": 1, "last_activity": -1 })
            .build();
        self.collection.create_indexes([unique_thread, by_user]).await?;
        Ok(())
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<MongoThread>> {
        Ok(self
            .collection
            .find_one(doc! { "thread_id": thread_id })
            .await?)
    }

    /// Upsert counters and activity; the owner is only written on insert
    pub async fn upsert_thread(&self, thread: Thread) -> Result<()> {
        let message_count = i64::try_from(thread.message_count).unwrap_or(i64::MAX);
        let filter = doc! { "thread_id": thread.thread_id.as_str() };
        let update = doc! {
            "$set": {
                "session_id": thread.session_id.as_str(),
                "message_count": message_count,
                "last_activity": bson::DateTime::from_millis(thread.last_activity.timestamp_millis()),
            },
            "$setOnInsert": {
                "user_id": thread.user_id.as_str(),
            }
        };

        self.collection.update_one(filter, update).upsert(true).await?;
        Ok(())
    }

    /// List threads for a user, most recent activity first
    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<MongoThread>> {
        let threads = self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "last_activity": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(result.deleted_count)
    }

    pub async fn delete_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let filter = doc! {
            "last_activity": { "$lt": bson::DateTime::from_millis(cutoff.timestamp_millis()) }
        };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
