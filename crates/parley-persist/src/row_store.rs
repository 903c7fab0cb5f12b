use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_types::Thread;

use crate::error::Result;
use crate::models::{MessageRow, PurgeReport};

/// Row-oriented operations over the `messages` and `threads` tables.
///
/// Implementations know nothing about identifier spaces or ownership; those
/// rules live in [`crate::HistoryStore`].
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert one immutable message row
    async fn insert_message(&self, row: MessageRow) -> Result<()>;

    /// Number of message rows stored under exactly `thread_id`
    async fn count_messages(&self, thread_id: &str) -> Result<u64>;

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// Insert or update a thread row. An existing row keeps its `user_id`.
    async fn upsert_thread(&self, thread: Thread) -> Result<()>;

    /// The most recent `limit` messages under `thread_id`, oldest first
    async fn recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageRow>>;

    /// Thread rows owned by `user_id`, most recent activity first
    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<Thread>>;

    /// Earliest user-authored message under `thread_id`
    async fn first_user_message(&self, thread_id: &str) -> Result<Option<MessageRow>>;

    /// Returns the number of rows removed
    async fn delete_messages(&self, thread_id: &str) -> Result<u64>;

    /// Returns the number of rows removed
    async fn delete_thread_row(&self, thread_id: &str) -> Result<u64>;

    /// Remove messages created and threads last active before `cutoff`
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport>;

    /// Cheap liveness check
    async fn ping(&self) -> Result<()>;
}
