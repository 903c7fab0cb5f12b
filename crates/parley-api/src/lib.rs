pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod rate_limit;
pub mod retention;
pub mod routes;
pub mod state;
pub mod transport;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    handlers::stream,
    middleware::logging,
    openapi::ApiDoc,
    routes::{health, history, status, threads},
    state::AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/stream", post(stream::chat_stream))
        .route("/history/:thread_id", get(history::get_history))
        .route("/threads", get(threads::list_threads))
        .route("/threads/:thread_id", delete(threads::delete_thread))
        .route("/status", get(status::chat_status));

    // The timeout bounds time to response headers; an open stream is not cut
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .nest("/chat", chat_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::permissive();
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let parsed_origins: Vec<HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();

        cors.allow_origin(parsed_origins)
    }
}
