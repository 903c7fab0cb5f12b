pub mod health;
pub mod history;
pub mod status;
pub mod threads;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// A thread owned by someone else is reported exactly like a missing one.
///
/// A thread with no metadata row yet is treated as the caller's own.
pub(crate) async fn ensure_owner(state: &AppState, thread_id: &str, user_id: &str) -> ApiResult<()> {
    match state.history.thread(thread_id).await? {
        Some(thread) if thread.user_id != user_id => {
            tracing::warn!(thread_id = %thread_id, user_id = %user_id, "Thread owned by another user");
            Err(ApiError::ThreadNotFound(thread_id.to_string()))
        }
        _ => Ok(()),
    }
}
