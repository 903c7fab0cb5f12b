use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use parley_turn::ChatTurnRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    config::ChatConfig,
    error::{ApiError, ApiResult},
    routes::ensure_owner,
    state::AppState,
    transport::sse_response,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatStreamRequest {
    pub message: String,
    pub thread_id: String,
    pub session_id: String,
}

impl ChatStreamRequest {
    /// Reject the request before anything is stored or generated
    pub fn validate(&self, limits: &ChatConfig) -> ApiResult<()> {
        if self.message.trim().is_empty() {
            return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
        }
        if self.message.chars().count() > limits.max_message_chars {
            return Err(ApiError::BadRequest(format!(
                "Message exceeds {} characters",
                limits.max_message_chars
            )));
        }
        validate_id("thread_id", &self.thread_id, limits.max_id_chars)?;
        validate_id("session_id", &self.session_id, limits.max_id_chars)?;
        Ok(())
    }
}

fn validate_id(field: &str, value: &str, max_chars: usize) -> ApiResult<()> {
    let len = value.chars().count();
    if len == 0 || len > max_chars {
        return Err(ApiError::BadRequest(format!(
            "{} must be between 1 and {} characters",
            field, max_chars
        )));
    }
    Ok(())
}

/// Send a message and stream the reply as Server-Sent Events
///
/// Each event is `data: {fragment}`; the stream ends after one `completion`
/// or `error` fragment, or silently if the turn is cancelled.
#[utoipa::path(
    post,
    path = "/chat/stream",
    request_body = ChatStreamRequest,
    responses(
        (status = 200, description = "Streaming reply", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Thread owned by another user"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<ChatStreamRequest>, JsonRejection>,
) -> ApiResult<Response> {
    state.rate_limiter.check(&user.user_id)?;
    let Json(req) = payload?;
    req.validate(&state.config.chat)?;
    ensure_owner(&state, &req.thread_id, &user.user_id).await?;

    tracing::info!(
        user_id = %user.user_id,
        thread_id = %req.thread_id,
        "Starting chat turn"
    );

    let handle = state.reconciler.spawn_turn(ChatTurnRequest {
        message: req.message,
        thread_id: req.thread_id,
        session_id: req.session_id,
        user_id: user.user_id,
    });

    Ok(sse_response(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str, thread_id: &str) -> ChatStreamRequest {
        ChatStreamRequest {
            message: message.to_string(),
            thread_id: thread_id.to_string(),
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn test_validation() {
        let limits = ChatConfig::default();

        assert!(request("hello", "t1").validate(&limits).is_ok());
        assert!(request("  \n\t", "t1").validate(&limits).is_err());
        assert!(request("hello", "").validate(&limits).is_err());
        assert!(request("hello", &"x".repeat(101)).validate(&limits).is_err());
        assert!(request("hello", &"x".repeat(100)).validate(&limits).is_ok());
        assert!(request(&"a".repeat(50_001), "t1").validate(&limits).is_err());
        assert!(request(&"a".repeat(50_000), "t1").validate(&limits).is_ok());
    }
}
