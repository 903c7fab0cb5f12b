use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{auth::AuthUser, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeatureFlags {
    pub streaming: bool,
    pub rate_limiting: bool,
    pub conversation_memory: bool,
    pub artifact_detection: bool,
    pub user_isolation: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub service: String,
    pub status: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub provider: String,
    pub features: FeatureFlags,
}

/// Chat service status for the authenticated caller
#[utoipa::path(
    get,
    path = "/chat/status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn chat_status(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "chat".to_string(),
        status: "healthy".to_string(),
        user_id: user.user_id,
        user_email: user.email,
        provider: state.provider_name.clone(),
        features: FeatureFlags {
            streaming: true,
            rate_limiting: state.config.rate_limit.enabled,
            conversation_memory: true,
            artifact_detection: true,
            user_isolation: true,
        },
    })
}
