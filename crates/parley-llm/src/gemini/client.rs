// Gemini streaming client (HTTP direct, no SDK)

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::traits::{ChatProvider, ChatRequest, TextStream, TurnRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client bound to one model
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// Create new client with API key and model name
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: GEMINI_API_BASE.to_string(),
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    /// Build streamGenerateContent payload: prior turns, then the new message
    fn build_request(&self, request: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Model => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": turn.text }],
                })
            })
            .collect();

        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": request.message }],
        }));

        let mut payload = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.options.temperature,
                "maxOutputTokens": request.options.max_output_tokens,
                "topP": request.options.top_p,
                "topK": request.options.top_k,
            },
        });

        if let Some(instruction) = &request.system_instruction {
            payload["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": instruction }],
            });
        }

        payload
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream> {
        let payload = self.build_request(&request);

        let response = self
            .http_client
            .post(self.stream_url())
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        Ok(parse_sse_stream(response.bytes_stream(), GeminiLineParser))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Extracts candidate text from streamGenerateContent chunks
pub struct GeminiLineParser;

impl SseLineParser for GeminiLineParser {
    type Item = String;

    fn parse_data_line(&self, data: &str) -> Result<Vec<String>> {
        let chunk: GenerateContentChunk =
            serde_json::from_str(data).context("Failed to parse Gemini chunk")?;

        if let Some(error) = chunk.error {
            anyhow::bail!(
                "Gemini API error ({}): {}",
                error.code.unwrap_or_default(),
                error.message.unwrap_or_default()
            );
        }

        if let Some(reason) = chunk
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            anyhow::bail!("Prompt blocked: {}", reason);
        }

        let text: String = chunk
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![text])
        }
    }

    // Gemini closes the stream instead of sending a marker
    fn is_done_marker(&self, _data: &str) -> bool {
        false
    }
}

// ============================================================================
// GEMINI-SPECIFIC RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}
