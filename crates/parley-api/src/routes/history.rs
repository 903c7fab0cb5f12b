use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use parley_types::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::{auth::AuthUser, error::ApiResult, routes::ensure_owner, state::AppState};

/// Upper bound on `limit` for history reads
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of most recent messages to return (default 50, max 100)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryMessage {
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for HistoryMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub thread_id: String,
    pub user_id: String,
    pub messages: Vec<HistoryMessage>,
    pub message_count: usize,
}

/// Conversation history for a thread, oldest first
#[utoipa::path(
    get,
    path = "/chat/history/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Thread history", body = HistoryResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Thread not found"),
        (status = 500, description = "Storage error")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(state.config.chat.history_limit)
        .min(MAX_HISTORY_LIMIT);

    ensure_owner(&state, &thread_id, &user.user_id).await?;

    let messages: Vec<HistoryMessage> = state
        .history
        .history(&thread_id, limit)
        .await?
        .into_iter()
        .map(HistoryMessage::from)
        .collect();

    Ok(Json(HistoryResponse {
        thread_id,
        user_id: user.user_id,
        message_count: messages.len(),
        messages,
    }))
}
