// OpenAI-compatible chat completions client

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::traits::{ChatProvider, ChatRequest, TextStream, TurnRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    /// Create new client with API key and model name
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build chat completion request payload
    fn build_chat_request(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.history.len() + 2);

        if let Some(instruction) = &request.system_instruction {
            messages.push(serde_json::json!({ "role": "system", "content": instruction }));
        }

        for turn in &request.history {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Model => "assistant",
            };
            messages.push(serde_json::json!({ "role": role, "content": turn.text }));
        }

        messages.push(serde_json::json!({ "role": "user", "content": request.message }));

        // top_k has no chat-completions counterpart
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "temperature": request.options.temperature,
            "top_p": request.options.top_p,
            "max_tokens": request.options.max_output_tokens,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream> {
        let payload = self.build_chat_request(&request);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        Ok(parse_sse_stream(response.bytes_stream(), OpenAILineParser))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Chat completions streaming parser: content deltas only
pub struct OpenAILineParser;

impl SseLineParser for OpenAILineParser {
    type Item = String;

    fn parse_data_line(&self, data: &str) -> Result<Vec<String>> {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(data).context("Failed to parse OpenAI chunk")?;

        if let Some(error) = chunk.error {
            anyhow::bail!("OpenAI API error: {}", error.message);
        }

        Ok(chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .collect())
    }
}

// ============================================================================
// OPENAI-SPECIFIC RESPONSE TYPES (for Chat Completions streaming)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}
