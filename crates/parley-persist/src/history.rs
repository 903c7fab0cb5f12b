use chrono::{DateTime, Utc};
use parley_types::{
    thread_id_spaces, title_from_content, Message, MessageRole, Thread, ThreadSummary,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PersistError, Result};
use crate::models::{MessageRow, PurgeReport};
use crate::row_store::RowStore;

/// Conversation history over a [`RowStore`].
///
/// Message rows are the source of truth. Thread rows are a best-effort cache
/// of their count and last activity, refreshed on every append.
#[derive(Clone)]
pub struct HistoryStore {
    rows: Arc<dyn RowStore>,
}

impl HistoryStore {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self { rows }
    }

    /// Insert one message, then refresh the thread row.
    ///
    /// Rejected before any write if the thread belongs to another user. A
    /// failed thread refresh is logged and does not fail the append.
    ///
    /// The ownership check and the insert are not atomic. When two users make
    /// the first append to the same new thread concurrently, both pass the
    /// check; the thread row keeps whichever owner is upserted first, but the
    /// other user's message row is still written under that thread.
    pub async fn append(
        &self,
        thread_id: &str,
        session_id: &str,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<()> {
        if let Some(existing) = self.thread(thread_id).await? {
            if existing.user_id != user_id {
                return Err(PersistError::ThreadOwnership {
                    thread_id: thread_id.to_string(),
                });
            }
        }

        let row = MessageRow::new(thread_id, session_id, user_id, role, content);
        let last_activity = row.created_at;
        self.rows.insert_message(row).await?;

        if let Err(e) = self
            .refresh_thread(thread_id, session_id, user_id, last_activity)
            .await
        {
            warn!(thread_id, error = %e, "Failed to update thread metadata");
        }

        Ok(())
    }

    // Recount instead of incrementing so any earlier skew heals here
    async fn refresh_thread(
        &self,
        thread_id: &str,
        session_id: &str,
        user_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<()> {
        let message_count = self.rows.count_messages(thread_id).await?;
        self.rows
            .upsert_thread(Thread {
                thread_id: thread_id.to_string(),
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                message_count,
                last_activity,
            })
            .await
    }

    /// At most `limit` most recent messages across both identifier spaces,
    /// oldest first
    pub async fn history(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for id in thread_id_spaces(thread_id) {
            rows.extend(self.rows.recent_messages(&id, limit).await?);
        }

        // Stable: rows from the same space keep their stored order on ties
        rows.sort_by_key(|row| row.created_at);
        let skip = rows.len().saturating_sub(limit);

        debug!(thread_id, count = rows.len() - skip, "Loaded history");
        Ok(rows.into_iter().skip(skip).map(Message::from).collect())
    }

    /// Thread row for either identifier space, canonical first
    pub async fn thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        for id in thread_id_spaces(thread_id) {
            if let Some(thread) = self.rows.get_thread(&id).await? {
                return Ok(Some(thread));
            }
        }
        Ok(None)
    }

    /// Threads owned by `user_id`, most recent activity first, titled by
    /// their earliest user message. Threads without one are skipped.
    pub async fn threads_for_user(&self, user_id: &str) -> Result<Vec<ThreadSummary>> {
        let threads = self.rows.threads_for_user(user_id).await?;
        let mut summaries = Vec::with_capacity(threads.len());

        for thread in threads {
            let Some(first) = self.rows.first_user_message(&thread.thread_id).await? else {
                continue;
            };
            summaries.push(ThreadSummary {
                title: title_from_content(&first.content),
                thread_id: thread.thread_id,
                session_id: thread.session_id,
                message_count: thread.message_count,
                last_activity: thread.last_activity,
            });
        }

        Ok(summaries)
    }

    /// Remove messages and thread rows in both identifier spaces.
    ///
    /// Every deletion is attempted; the first failure is returned.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut first_error = None;

        for id in thread_id_spaces(thread_id) {
            match self.rows.delete_messages(&id).await {
                Ok(n) => debug!(thread_id = %id, deleted = n, "Deleted messages"),
                Err(e) => {
                    warn!(thread_id = %id, error = %e, "Failed to delete messages");
                    first_error.get_or_insert(e);
                }
            }
            match self.rows.delete_thread_row(&id).await {
                Ok(n) => debug!(thread_id = %id, deleted = n, "Deleted thread row"),
                Err(e) => {
                    warn!(thread_id = %id, error = %e, "Failed to delete thread row");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Retention cleanup: drop messages and threads older than `cutoff`
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        self.rows.purge_before(cutoff).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.rows.ping().await
    }
}
