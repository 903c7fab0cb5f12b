use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use parley_types::{MessageRole, Thread};
use serde::{Deserialize, Serialize};

use crate::models::MessageRow;

/// MongoDB document for the `messages` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub thread_id: String,
    pub session_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// MongoDB document for the `threads` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoThread {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub thread_id: String,
    pub user_id: String,
    pub session_id: String,
    pub message_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_activity: DateTime<Utc>,
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<MessageRow> for MongoMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: None,
            thread_id: row.thread_id,
            session_id: row.session_id,
            user_id: row.user_id,
            role: row.role,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

impl From<MongoMessage> for MessageRow {
    fn from(doc: MongoMessage) -> Self {
        Self {
            thread_id: doc.thread_id,
            session_id: doc.session_id,
            user_id: doc.user_id,
            role: doc.role,
            content: doc.content,
            created_at: doc.created_at,
        }
    }
}

impl From<MongoThread> for Thread {
    fn from(doc: MongoThread) -> Self {
        Self {
            thread_id: doc.thread_id,
            user_id: doc.user_id,
            session_id: doc.session_id,
            message_count: doc.message_count.max(0) as u64,
            last_activity: doc.last_activity,
        }
    }
}
