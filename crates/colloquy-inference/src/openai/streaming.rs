//! SSE stream parsing for OpenAI-compatible streaming responses.

use futures::{future, stream, Stream, StreamExt};

use colloquy_core::{Error, Result};

use super::types::ChatCompletionChunk;
use crate::chat::TokenStream;

#[derive(Debug)]
enum SseEvent {
    Token(String),
    Failed(Error),
    Done,
}

/// Parse an SSE byte stream into content fragments.
///
/// Lines are reassembled across network chunks; the stream ends at
/// `data: [DONE]` or when the body ends.
pub fn parse_sse_stream(
    body: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> TokenStream {
    let mut buffer: Vec<u8> = Vec::new();

    let events = body.flat_map(move |chunk| {
        let events = match chunk {
            Ok(bytes) => {
                buffer.extend_from_slice(&bytes);
                drain_lines(&mut buffer)
            }
            Err(e) => vec![SseEvent::Failed(Error::Provider(format!("Stream error: {}", e)))],
        };
        stream::iter(events)
    });

    let tokens = events
        .take_while(|event| future::ready(!matches!(event, SseEvent::Done)))
        .filter_map(|event| {
            future::ready(match event {
                SseEvent::Token(text) => Some(Ok(text)),
                SseEvent::Failed(e) => Some(Err(e)),
                SseEvent::Done => None,
            })
        });

    Box::pin(tokens)
}

/// Remove every complete line from `buffer` and parse it.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<SseEvent> {
    let mut events = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        if let Some(event) = parse_sse_line(line.trim()) {
            events.push(event);
        }
    }
    events
}

fn parse_sse_line(line: &str) -> Option<SseEvent> {
    // Skip blank lines, comments and non-data fields
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    match parse_sse_data(data) {
        Some(Ok(text)) => Some(SseEvent::Token(text)),
        Some(Err(e)) => Some(SseEvent::Failed(e)),
        None => None,
    }
}

/// Extract delta content from one `data:` payload.
pub fn parse_sse_data(data: &str) -> Option<Result<String>> {
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if content.is_empty() {
                None
            } else {
                Some(Ok(content))
            }
        }
        Err(e) => Some(Err(Error::Provider(format!(
            "Failed to parse SSE chunk: {}",
            e
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: Vec<&'static str>) -> Vec<Result<String>> {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(bytes::Bytes::from(c))),
        );
        futures::executor::block_on(parse_sse_stream(body).collect::<Vec<_>>())
    }

    #[test]
    fn test_parse_sse_data_with_content() {
        let data = r#"{"id":"test","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_data(data).unwrap().unwrap(), "Hello");
    }

    #[test]
    fn test_parse_sse_data_role_only() {
        let data = r#"{"id":"test","choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert!(parse_sse_data(data).is_none());
    }

    #[test]
    fn test_parse_sse_data_invalid_json() {
        assert!(parse_sse_data("{invalid json}").unwrap().is_err());
    }

    #[test]
    fn test_stream_multiple_events() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" World\"}}]}\n\n",
            "data: [DONE]\n\n",
        ]);
        let tokens: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(tokens, vec!["Hello", " World"]);
    }

    #[test]
    fn test_stream_line_split_across_chunks() {
        let out = collect(vec![
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"joined\"}}]}\n\n",
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "joined");
    }

    #[test]
    fn test_stream_stops_at_done() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_stream_skips_comments_and_blank_lines() {
        let out = collect(vec![": keep-alive\n\n", "event: message\n", "data: [DONE]\n"]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_stream_surfaces_parse_errors() {
        let out = collect(vec!["data: {broken\n\n"]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }
}
