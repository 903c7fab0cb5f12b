use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{handlers::stream, routes::{health, history, status, threads}};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::root,
        stream::chat_stream,
        history::get_history,
        threads::list_threads,
        threads::delete_thread,
        status::chat_status,
    ),
    components(schemas(
        health::HealthResponse,
        health::RootResponse,
        stream::ChatStreamRequest,
        history::HistoryMessage,
        history::HistoryResponse,
        threads::ThreadEntry,
        threads::ThreadsResponse,
        threads::DeleteThreadResponse,
        status::FeatureFlags,
        status::StatusResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness"),
        (name = "chat", description = "Streaming chat and conversation history")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
