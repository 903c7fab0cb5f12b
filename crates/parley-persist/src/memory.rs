use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_types::{MessageRole, Thread};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{MessageRow, PurgeReport};
use crate::row_store::RowStore;

/// In-memory row store for testing and local development.
#[derive(Default)]
pub struct MemoryRowStore {
    messages: RwLock<HashMap<String, Vec<MessageRow>>>,
    threads: RwLock<HashMap<String, Thread>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn insert_message(&self, row: MessageRow) -> Result<()> {
        let mut messages = self.messages.write().await;
        messages.entry(row.thread_id.clone()).or_default().push(row);
        Ok(())
    }

    async fn count_messages(&self, thread_id: &str) -> Result<u64> {
        let messages = self.messages.read().await;
        Ok(messages.get(thread_id).map_or(0, |rows| rows.len() as u64))
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn upsert_thread(&self, thread: Thread) -> Result<()> {
        let mut threads = self.threads.write().await;
        match threads.get_mut(&thread.thread_id) {
            Some(existing) => {
                existing.session_id = thread.session_id;
                existing.message_count = thread.message_count;
                existing.last_activity = thread.last_activity;
            }
            None => {
                threads.insert(thread.thread_id.clone(), thread);
            }
        }
        Ok(())
    }

    async fn recent_messages(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageRow>> {
        let messages = self.messages.read().await;
        let mut rows = messages.get(thread_id).cloned().unwrap_or_default();
        rows.sort_by_key(|row| row.created_at);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.split_off(skip))
    }

    async fn threads_for_user(&self, user_id: &str) -> Result<Vec<Thread>> {
        let threads = self.threads.read().await;
        let mut owned: Vec<Thread> = threads
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(owned)
    }

    async fn first_user_message(&self, thread_id: &str) -> Result<Option<MessageRow>> {
        let messages = self.messages.read().await;
        Ok(messages.get(thread_id).and_then(|rows| {
            rows.iter()
                .filter(|row| row.role == MessageRole::User)
                .min_by_key(|row| row.created_at)
                .cloned()
        }))
    }

    async fn delete_messages(&self, thread_id: &str) -> Result<u64> {
        let mut messages = self.messages.write().await;
        Ok(messages.remove(thread_id).map_or(0, |rows| rows.len() as u64))
    }

    async fn delete_thread_row(&self, thread_id: &str) -> Result<u64> {
        let mut threads = self.threads.write().await;
        Ok(threads.remove(thread_id).map_or(0, |_| 1))
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();

        let mut messages = self.messages.write().await;
        for rows in messages.values_mut() {
            let before = rows.len();
            rows.retain(|row| row.created_at >= cutoff);
            report.messages_deleted += (before - rows.len()) as u64;
        }
        messages.retain(|_, rows| !rows.is_empty());
        drop(messages);

        let mut threads = self.threads.write().await;
        let before = threads.len();
        threads.retain(|_, thread| thread.last_activity >= cutoff);
        report.threads_deleted = (before - threads.len()) as u64;

        Ok(report)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
