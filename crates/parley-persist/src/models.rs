use chrono::{DateTime, Utc};
use parley_types::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// Stored form of one message, keyed by the thread id it was written under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub thread_id: String,
    pub session_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub fn new(
        thread_id: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message::new(row.role, row.content).at(row.created_at)
    }
}

/// Rows removed by a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub messages_deleted: u64,
    pub threads_deleted: u64,
}
