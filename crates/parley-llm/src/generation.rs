use crate::artifact::detect_artifact;
use crate::traits::{ChatProvider, ChatRequest, ChatTurn, GenerationOptions};
use futures::{Stream, StreamExt};
use parley_types::{Message, MessageRole, StreamFragment};
use std::pin::Pin;
use std::sync::Arc;

/// Lazily produced fragments of one generated reply
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamFragment> + Send>>;

/// Persona preamble sent with every conversation unless overridden
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI coding assistant. \
Generate clean, well-documented code with explanations. \
When creating code, wrap it in markdown code blocks with proper language tags. \
Be concise but thorough in your explanations. \
If you generate code that could be used as an artifact, mention it clearly.";

/// Turns a provider's raw text stream into client-facing fragments.
///
/// Every stream ends with exactly one terminal fragment: `completion` when
/// the provider finished, `error` when it failed at any point.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn ChatProvider>,
    system_instruction: String,
    options: GenerationOptions,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Stream a reply to `message` with `history` (oldest first) as context.
    ///
    /// Nothing is sent to the provider until the returned stream is first
    /// polled. Fragments carry `thread_id` and `session_id` verbatim.
    pub fn stream_reply(
        &self,
        message: &str,
        history: &[Message],
        thread_id: &str,
        session_id: &str,
    ) -> FragmentStream {
        let request = ChatRequest::new(message)
            .with_history(to_chat_turns(history))
            .with_system_instruction(self.system_instruction.clone())
            .with_options(self.options.clone());

        let provider = Arc::clone(&self.provider);
        let thread_id = thread_id.to_string();
        let session_id = session_id.to_string();

        Box::pin(async_stream::stream! {
            let mut text_stream = match provider.stream_chat(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(provider = provider.name(), error = %e, "Failed to start generation");
                    yield StreamFragment::error(&thread_id, &session_id, e.to_string());
                    return;
                }
            };

            let mut full_response = String::new();

            while let Some(chunk) = text_stream.next().await {
                match chunk {
                    Ok(text) => {
                        if text.is_empty() {
                            continue;
                        }
                        full_response.push_str(&text);
                        let has_artifact = detect_artifact(&text);
                        yield StreamFragment::delta(text, &thread_id, &session_id, has_artifact);
                    }
                    Err(e) => {
                        tracing::error!(provider = provider.name(), error = %e, "Error in generation stream");
                        yield StreamFragment::error(&thread_id, &session_id, e.to_string());
                        return;
                    }
                }
            }

            yield StreamFragment::completion(&thread_id, &session_id, detect_artifact(&full_response));
        })
    }
}

/// Provider view of stored history: system rows are dropped, assistant rows
/// become model turns.
fn to_chat_turns(history: &[Message]) -> Vec<ChatTurn> {
    history
        .iter()
        .filter_map(|message| match message.role {
            MessageRole::User => Some(ChatTurn::user(message.content.clone())),
            MessageRole::Assistant => Some(ChatTurn::model(message.content.clone())),
            MessageRole::System => None,
        })
        .collect()
}
