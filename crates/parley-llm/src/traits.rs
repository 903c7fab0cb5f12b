use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Raw text fragments produced by a provider, in arrival order
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for text-generation providers that stream a contextual chat reply
///
/// Calling `stream_chat` starts the provider call; the returned stream yields
/// incremental text for the new turn and ends when the provider is done.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a chat with prior turns as context and stream the reply to `request.message`
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Speaker of a prior turn as seen by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub options: GenerationOptions,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            history: Vec::new(),
            message: message.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Sampling parameters, fixed per deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 8192,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }
}
