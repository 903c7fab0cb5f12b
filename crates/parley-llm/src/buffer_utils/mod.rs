mod sse_parser;

pub use sse_parser::{parse_sse_stream, SseLineParser};
