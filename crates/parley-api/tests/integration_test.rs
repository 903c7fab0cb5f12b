use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use parley_api::{build_router, config::Config, state::AppState};
use parley_llm::{ChatProvider, ChatRequest, TextStream};
use parley_persist::{MemoryRowStore, RowStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct ScriptedProvider {
    chunks: Vec<String>,
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<TextStream> {
        let items = self.chunks.clone().into_iter().map(Ok::<String, anyhow::Error>);
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct TestApp {
    state: Arc<AppState>,
    rows: Arc<MemoryRowStore>,
}

impl TestApp {
    fn new(chunks: &[&str]) -> Self {
        Self::with_config(chunks, test_config())
    }

    fn with_config(chunks: &[&str], config: Config) -> Self {
        let rows = Arc::new(MemoryRowStore::new());
        let provider = Arc::new(ScriptedProvider {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
        });
        let state = Arc::new(AppState::new(config, rows.clone(), provider));
        Self { state, rows }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt_secret = SECRET.to_string();
    config.rate_limit.max_requests = 100;
    config
}

fn token_for(user_id: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "email": format!("{}@example.com", user_id),
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn chat_request(user_id: &str, message: &str, thread_id: &str) -> Request<Body> {
    let body = json!({
        "message": message,
        "thread_id": thread_id,
        "session_id": "session-1",
    });
    Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)))
        .body(Body::empty())
        .unwrap()
}

fn sse_payloads(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter(|event| !event.is_empty())
        .map(|event| {
            let data = event.strip_prefix("data: ").expect("event is a data line");
            serde_json::from_str(data).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_stream_requires_token() {
    let app = TestApp::new(&["hi"]);
    let request = Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"message": "hi", "thread_id": "t1", "session_id": "s1"}).to_string()))
        .unwrap();

    let (status, headers, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(app.rows.count_messages("req_t1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_blank_message_rejected_before_side_effects() {
    let app = TestApp::new(&["hi"]);

    let (status, _, body) = app.send(chat_request("alice", "   ", "t1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
    assert_eq!(app.rows.count_messages("req_t1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let app = TestApp::new(&["hi"]);
    let request = Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for("alice")))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"message\": "))
        .unwrap();

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert!(error["error"].as_str().unwrap().starts_with("Invalid request"));

    let (status, _, body) = app
        .send(authed("GET", "/chat/history/t1?limit=lots", "alice"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_str(&body).unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
async fn test_oversized_thread_id_rejected() {
    let app = TestApp::new(&["hi"]);
    let (status, _, _) = app.send(chat_request("alice", "hello", &"x".repeat(101))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_emits_fragments_and_persists_turn() {
    let app = TestApp::new(&["Here is ", "```python\nprint('hi')\n```"]);

    let (status, headers, body) = app.send(chat_request("alice", "show me code", "t1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let events = sse_payloads(&body);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["type"], "delta");
    assert_eq!(events[0]["content"], "Here is ");
    assert_eq!(events[0]["thread_id"], "t1");
    assert_eq!(events[1]["type"], "delta");
    assert_eq!(events[2]["type"], "completion");
    assert_eq!(events[2]["content"], "");
    assert_eq!(events[2]["has_artifact"], true);

    let (status, _, body) = app.send(authed("GET", "/chat/history/t1", "alice")).await;
    assert_eq!(status, StatusCode::OK);

    let history: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(history["user_id"], "alice");
    assert_eq!(history["message_count"], 2);
    assert_eq!(history["messages"][0]["role"], "user");
    assert_eq!(history["messages"][0]["content"], "show me code");
    assert_eq!(history["messages"][1]["role"], "assistant");
    assert_eq!(
        history["messages"][1]["content"],
        "Here is ```python\nprint('hi')\n```"
    );
}

#[tokio::test]
async fn test_other_users_thread_is_not_found() {
    let app = TestApp::new(&["hello"]);
    app.send(chat_request("alice", "hi", "t1")).await;

    let (status, _, _) = app.send(authed("GET", "/chat/history/t1", "mallory")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.send(authed("DELETE", "/chat/threads/t1", "mallory")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.rows.count_messages("req_t1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_other_users_thread_refuses_new_turns() {
    let app = TestApp::new(&["hello"]);
    app.send(chat_request("alice", "hi", "t1")).await;

    let (status, _, body) = app.send(chat_request("mallory", "mine now", "t1")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.contains("data:"));
    assert_eq!(app.rows.count_messages("req_t1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_threads_listing_and_delete() {
    let app = TestApp::new(&["sure"]);
    app.send(chat_request("alice", "plan a trip to the mountains this weekend please", "t1"))
        .await;
    app.send(chat_request("bob", "unrelated", "t2")).await;

    let (status, _, body) = app.send(authed("GET", "/chat/threads", "alice")).await;
    assert_eq!(status, StatusCode::OK);

    let listing: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listing["user_id"], "alice");
    assert_eq!(listing["thread_count"], 1);
    assert_eq!(listing["threads"][0]["thread_id"], "req_t1");
    assert_eq!(
        listing["threads"][0]["title"],
        "plan a trip to the mountains this weekend please"
    );
    assert_eq!(listing["threads"][0]["message_count"], 2);

    let (status, _, body) = app.send(authed("DELETE", "/chat/threads/t1", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("deleted successfully"));
    assert_eq!(app.rows.count_messages("req_t1").await.unwrap(), 0);

    let (_, _, body) = app.send(authed("GET", "/chat/threads", "alice")).await;
    let listing: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listing["thread_count"], 0);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    let app = TestApp::with_config(&["ok"], config);

    for _ in 0..2 {
        let (status, _, _) = app.send(chat_request("alice", "hi", "t1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, _) = app.send(chat_request("alice", "hi", "t1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));

    // Limits are per user
    let (status, _, _) = app.send(chat_request("bob", "hi", "t9")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_status() {
    let app = TestApp::new(&[]);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["services"]["storage"], "connected");

    let (status, _, body) = app.send(authed("GET", "/chat/status", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["user_id"], "alice");
    assert_eq!(report["user_email"], "alice@example.com");
    assert_eq!(report["features"]["streaming"], true);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = TestApp::new(&[]);
    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/chat/stream"));
}
