mod client;

pub use client::{OpenAIClient, OpenAILineParser, OPENAI_API_BASE};
