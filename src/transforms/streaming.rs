//! SSE stream transformations.
//!
//! This module provides:
//! - `SseRewriter`: chunk-feedable line buffer that rewrites tool-call names
//!   inside `data:` events and forwards every other line byte-for-byte
//! - `stream_canonicalize_tool_names`: wrap an upstream byte stream in an
//!   `SseRewriter`, preserving ordering and surfacing upstream failures
//!
//! The rewriter buffers raw bytes, not decoded text, so a chunk boundary may
//! fall anywhere in the stream, including inside a multi-byte character.

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use serde_json::Value;

use super::tool_names::canonicalize_tool_calls;

/// Prefix of an SSE event-data line.
const DATA_PREFIX: &str = "data: ";

/// Payload of the stream-termination sentinel line.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line rewriter.
///
/// Feed it upstream chunks as they arrive; each call returns the bytes to
/// emit for that chunk. Complete lines are processed immediately and the
/// trailing partial line stays buffered until the next chunk, so output never
/// lags more than one incomplete line behind input.
#[derive(Debug, Default)]
pub struct SseRewriter {
    buffer: BytesMut,
}

impl SseRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one upstream chunk, returning the bytes to emit for it.
    pub fn feed(&mut self, chunk: &[u8]) -> Bytes {
        self.buffer.extend_from_slice(chunk);

        let mut output = BytesMut::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(newline_pos + 1);
            match rewrite_line(&line[..newline_pos]) {
                Some(rewritten) => output.extend_from_slice(rewritten.as_bytes()),
                None => output.extend_from_slice(&line),
            }
        }
        output.freeze()
    }

    /// Bytes still buffered when the upstream ends: a trailing line that
    /// never got its newline. Forwarded verbatim rather than dropped.
    pub fn finish(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

/// Rewrite one complete line (without its newline) if it is an event-data
/// line whose JSON payload carries `choices[0].delta.tool_calls`. `None`
/// means the caller forwards the original bytes: non-data lines, the
/// `[DONE]` sentinel, unparseable payloads, and events without that field
/// all pass through untouched.
fn rewrite_line(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?;
    let payload = text.strip_prefix(DATA_PREFIX)?;

    if payload.trim() == DONE_SENTINEL {
        return None;
    }

    let mut event: Value = serde_json::from_str(payload).ok()?;
    let tool_calls = event
        .pointer_mut("/choices/0/delta/tool_calls")?
        .as_array_mut()?;

    let rewritten = canonicalize_tool_calls(tool_calls);
    if rewritten > 0 {
        tracing::debug!(rewritten, "canonicalized tool calls in stream delta");
    }

    Some(format!("{DATA_PREFIX}{event}\n"))
}

/// Canonicalize tool-call names in an SSE byte stream.
///
/// Lines are emitted in the order received, rewritten lines substituted in
/// place. The generator only polls upstream after the previous output chunk
/// has been consumed, so downstream backpressure propagates and buffering
/// stays bounded by one chunk plus one partial line. An upstream error is
/// surfaced on the output stream and terminates it; normal end of input
/// flushes the trailing buffer and closes cleanly.
pub fn stream_canonicalize_tool_names<S, E>(
    body: S,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    stream! {
        use futures_util::StreamExt;

        let mut rewriter = SseRewriter::new();
        let mut body = std::pin::pin!(body);

        while let Some(chunk_result) = body.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(std::io::Error::other(e));
                    return;
                }
            };

            let output = rewriter.feed(&chunk);
            if !output.is_empty() {
                yield Ok(output);
            }
        }

        let trailing = rewriter.finish();
        if !trailing.is_empty() {
            yield Ok(trailing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn delta_line(name: &str) -> String {
        format!(
            "data: {}\n",
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"name": name, "arguments": ""}}]}}]})
        )
    }

    fn feed_all(rewriter: &mut SseRewriter, input: &[u8]) -> Vec<u8> {
        let mut out = rewriter.feed(input).to_vec();
        out.extend_from_slice(&rewriter.finish());
        out
    }

    #[test]
    fn test_delta_tool_call_renamed() {
        let mut rewriter = SseRewriter::new();
        let input = format!("{}\n{}", delta_line("WebSearch"), "data: [DONE]\n\n");
        let output = feed_all(&mut rewriter, input.as_bytes());
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains(r#""name":"web_search""#));
        assert!(!output.contains("WebSearch"));
        assert!(output.ends_with("data: [DONE]\n\n"));
    }

    #[test]
    fn test_delta_without_tool_calls_verbatim() {
        let mut rewriter = SseRewriter::new();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n";
        let output = feed_all(&mut rewriter, line.as_bytes());
        assert_eq!(output, line.as_bytes());
    }

    #[test]
    fn test_malformed_json_line_verbatim() {
        let mut rewriter = SseRewriter::new();
        let line = "data: {not json, tool_calls: WebSearch\n";
        let output = feed_all(&mut rewriter, line.as_bytes());
        assert_eq!(output, line.as_bytes());
    }

    #[test]
    fn test_non_data_lines_verbatim() {
        let mut rewriter = SseRewriter::new();
        let input = b": keep-alive\n\nevent: ping\n";
        let output = feed_all(&mut rewriter, input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_sentinel_verbatim() {
        let mut rewriter = SseRewriter::new();
        let output = feed_all(&mut rewriter, b"data: [DONE]\n");
        assert_eq!(output, b"data: [DONE]\n");
    }

    #[test]
    fn test_partial_line_held_until_newline() {
        let mut rewriter = SseRewriter::new();
        let line = delta_line("WebSearch");
        let (head, tail) = line.split_at(20);

        assert!(rewriter.feed(head.as_bytes()).is_empty());
        let output = rewriter.feed(tail.as_bytes());
        assert!(
            std::str::from_utf8(&output)
                .unwrap()
                .contains(r#""name":"web_search""#)
        );
    }

    #[test]
    fn test_trailing_fragment_flushed_verbatim() {
        let mut rewriter = SseRewriter::new();
        assert!(rewriter.feed(b"data: {\"trunc").is_empty());
        assert_eq!(&rewriter.finish()[..], b"data: {\"trunc");
    }

    #[test]
    fn test_chunk_split_idempotence() {
        // A mixed sequence containing multi-byte characters, a rewrite
        // target, a malformed line, and the sentinel.
        let input = format!(
            "data: {}\n\n{}\ndata: not json é\n\ndata: [DONE]\n\n",
            json!({"choices": [{"delta": {"content": "héllo wörld"}}]}),
            delta_line("WebSearch").trim_end(),
        );
        let bytes = input.as_bytes();

        let mut whole = SseRewriter::new();
        let expected = feed_all(&mut whole, bytes);

        // Split at every possible boundary, including mid-line and
        // mid-UTF-8-sequence.
        for split in 0..=bytes.len() {
            let mut rewriter = SseRewriter::new();
            let mut output = rewriter.feed(&bytes[..split]).to_vec();
            output.extend_from_slice(&rewriter.feed(&bytes[split..]));
            output.extend_from_slice(&rewriter.finish());
            assert_eq!(output, expected, "split at byte {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time_feeding() {
        let input = format!("{}data: [DONE]\n\n", delta_line("web_search"));
        let bytes = input.as_bytes();

        let mut whole = SseRewriter::new();
        let expected = feed_all(&mut whole, bytes);

        let mut rewriter = SseRewriter::new();
        let mut output = Vec::new();
        for byte in bytes {
            output.extend_from_slice(&rewriter.feed(std::slice::from_ref(byte)));
        }
        output.extend_from_slice(&rewriter.finish());
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn test_stream_rewrites_and_preserves_order() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta_line("WebSearch"))),
            Ok(Bytes::from("\ndata: [DONE]\n\n")),
        ];
        let stream = stream_canonicalize_tool_names(futures_util::stream::iter(chunks));
        let collected: Vec<_> = stream.collect().await;

        let output: Vec<u8> = collected
            .into_iter()
            .flat_map(|r| r.unwrap().to_vec())
            .collect();
        let output = String::from_utf8(output).unwrap();

        let done_pos = output.find("data: [DONE]").unwrap();
        let rewrite_pos = output.find(r#""name":"web_search""#).unwrap();
        assert!(rewrite_pos < done_pos);
    }

    #[tokio::test]
    async fn test_stream_upstream_error_propagates() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("data: [DONE]\n\n")),
            Err(std::io::Error::other("connection reset")),
        ];
        let stream = stream_canonicalize_tool_names(futures_util::stream::iter(chunks));
        let collected: Vec<_> = stream.collect().await;

        assert_eq!(collected.len(), 2);
        assert!(collected[0].is_ok());
        let err = collected[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_stream_flushes_trailing_fragment() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("data: [DONE]\n\npartial"))];
        let stream = stream_canonicalize_tool_names(futures_util::stream::iter(chunks));
        let collected: Vec<_> = stream.collect().await;

        let output: Vec<u8> = collected
            .into_iter()
            .flat_map(|r| r.unwrap().to_vec())
            .collect();
        assert_eq!(output, b"data: [DONE]\n\npartial");
    }
}
