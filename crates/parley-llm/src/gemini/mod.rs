mod client;

pub use client::{GeminiClient, GeminiLineParser, GEMINI_API_BASE};
