use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use parley_types::ThreadSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{auth::AuthUser, error::ApiResult, routes::ensure_owner, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ThreadEntry {
    pub thread_id: String,
    pub session_id: String,
    pub title: String,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
}

impl From<ThreadSummary> for ThreadEntry {
    fn from(summary: ThreadSummary) -> Self {
        Self {
            thread_id: summary.thread_id,
            session_id: summary.session_id,
            title: summary.title,
            message_count: summary.message_count,
            last_activity: summary.last_activity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ThreadsResponse {
    pub user_id: String,
    pub threads: Vec<ThreadEntry>,
    pub thread_count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteThreadResponse {
    pub message: String,
}

/// List the caller's threads, most recent activity first
#[utoipa::path(
    get,
    path = "/chat/threads",
    responses(
        (status = 200, description = "Threads owned by the caller", body = ThreadsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Storage error")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ThreadsResponse>> {
    let threads: Vec<ThreadEntry> = state
        .history
        .threads_for_user(&user.user_id)
        .await?
        .into_iter()
        .map(ThreadEntry::from)
        .collect();

    Ok(Json(ThreadsResponse {
        user_id: user.user_id,
        thread_count: threads.len(),
        threads,
    }))
}

/// Delete a thread and all of its messages
///
/// Deleting a thread that does not exist succeeds.
#[utoipa::path(
    delete,
    path = "/chat/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread deleted", body = DeleteThreadResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Thread not found"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Storage error")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<DeleteThreadResponse>> {
    state.rate_limiter.check(&user.user_id)?;
    ensure_owner(&state, &thread_id, &user.user_id).await?;

    state.history.delete_thread(&thread_id).await?;
    tracing::info!(thread_id = %thread_id, user_id = %user.user_id, "Thread deleted");

    Ok(Json(DeleteThreadResponse {
        message: format!("Thread {} deleted successfully", thread_id),
    }))
}
