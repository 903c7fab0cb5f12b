use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Returns 503 while the history store is unreachable
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "History store unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = HashMap::new();
    services.insert("llm".to_string(), state.provider_name.clone());

    let healthy = match state.history.ping().await {
        Ok(()) => {
            services.insert("storage".to_string(), "connected".to_string());
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "History store ping failed");
            services.insert("storage".to_string(), "disconnected".to_string());
            false
        }
    };

    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services,
        }),
    )
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub service: String,
    pub version: String,
    pub docs: String,
}

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = RootResponse)),
    tag = "health"
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "parley".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/api/docs".to_string(),
    })
}
