pub mod artifact;
pub mod buffer_utils;
pub mod config;
pub mod gemini;
pub mod generation;
pub mod openai;
pub mod traits;

pub use traits::{ChatProvider, ChatRequest, ChatTurn, GenerationOptions, TextStream, TurnRole};

pub use artifact::detect_artifact;
pub use buffer_utils::{parse_sse_stream, SseLineParser};
pub use config::{ClientFactory, ProviderConfig, ProviderType};
pub use gemini::GeminiClient;
pub use generation::{FragmentStream, GenerationClient, DEFAULT_SYSTEM_INSTRUCTION};
pub use openai::OpenAIClient;
