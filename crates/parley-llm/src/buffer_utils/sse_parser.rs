use anyhow::Result;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;

/// Pending bytes of a response body, split into `\n`-terminated lines.
///
/// Decoding happens per line, so a multi-byte character cut by a chunk
/// boundary is only decoded once the line is complete.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
    // Bytes before this offset are known to contain no newline
    scanned: usize,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.pending.len();
            return None;
        };
        let end = self.scanned + offset;
        let rest = self.pending.split_off(end + 1);
        let line = std::mem::replace(&mut self.pending, rest);
        self.scanned = 0;
        Some(decode_line(line))
    }

    fn finish(&mut self) -> Option<Result<String>> {
        if self.pending.is_empty() {
            return None;
        }
        self.scanned = 0;
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map(|line| line.trim().to_string())
        .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in stream: {}", e))
}

/// Strategy pattern for parsing different providers' SSE payloads
pub trait SseLineParser: Send {
    type Item: Send;

    /// Parse the payload of one `data:` line
    fn parse_data_line(&self, data: &str) -> Result<Vec<Self::Item>>;

    /// Check if this payload signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Generic SSE stream parser over a byte stream.
///
/// Yields the parser's items in order; the first error is yielded and then
/// the stream ends.
pub fn parse_sse_stream<S, B, E, P>(
    byte_stream: S,
    parser: P,
) -> Pin<Box<dyn Stream<Item = Result<P::Item>> + Send>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(byte_stream);
        let mut buffer = LineBuffer::default();
        let mut done = false;

        'chunks: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push(bytes.as_ref());

                    while let Some(line_result) = buffer.next_line() {
                        match parse_line(&parser, line_result) {
                            LineOutcome::Items(items) => {
                                for item in items {
                                    yield Ok(item);
                                }
                            }
                            LineOutcome::Done => {
                                done = true;
                                break 'chunks;
                            }
                            LineOutcome::Failed(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    return;
                }
            }
        }

        if !done {
            if let Some(line_result) = buffer.finish() {
                match parse_line(&parser, line_result) {
                    LineOutcome::Items(items) => {
                        for item in items {
                            yield Ok(item);
                        }
                    }
                    LineOutcome::Done => {}
                    LineOutcome::Failed(e) => yield Err(e),
                }
            }
        }
    })
}

enum LineOutcome<T> {
    Items(Vec<T>),
    Done,
    Failed(anyhow::Error),
}

fn parse_line<P: SseLineParser>(parser: &P, line: Result<String>) -> LineOutcome<P::Item> {
    let line = match line {
        Ok(line) => line,
        Err(e) => return LineOutcome::Failed(e),
    };

    // Comments, event names and blank separators carry no payload
    let Some(data) = line.strip_prefix("data:") else {
        return LineOutcome::Items(Vec::new());
    };
    let data = data.trim_start();

    if parser.is_done_marker(data) {
        return LineOutcome::Done;
    }

    match parser.parse_data_line(data) {
        Ok(items) => LineOutcome::Items(items),
        Err(e) => LineOutcome::Failed(e),
    }
}
