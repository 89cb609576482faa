//! Gemini → Anthropic response translation, unary and streaming.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde_json::json;
use uuid::Uuid;

use gravity_types::protocol::claude::{MessagesResponse, MessagesUsage, ResponseContent};
use gravity_types::protocol::gemini::GenerateContentResponse;

use super::{parse_stream_line, StreamUsage};

/// Map a Gemini finish reason onto an Anthropic stop reason.
fn stop_reason_for(finish_reason: Option<&str>) -> &'static str {
    match finish_reason {
        Some("MAX_TOKENS") => "max_tokens",
        _ => "end_turn",
    }
}

/// Convert a unary Gemini response into an Anthropic message.
pub fn to_messages_response(
    response: &GenerateContentResponse,
    model: &str,
) -> MessagesResponse {
    let mut text = String::new();
    let mut stop_reason = "end_turn";
    if let Some(candidate) = response.candidates.first() {
        if let Some(part) = candidate.content.parts.first() {
            text = part.text.clone();
        }
        stop_reason = stop_reason_for(candidate.finish_reason.as_deref());
    }

    let usage = response.usage_metadata;
    MessagesResponse {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        kind: "message",
        role: "assistant",
        content: vec![ResponseContent { kind: "text", text }],
        model: model.to_string(),
        stop_reason: stop_reason.to_string(),
        stop_sequence: None,
        usage: MessagesUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        },
    }
}

fn event(name: &str, data: serde_json::Value) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", name, data))
}

/// Relay a Gemini SSE stream as the Anthropic event sequence:
/// `message_start`, `content_block_start`, `content_block_delta`…,
/// `content_block_stop`, `message_delta`, `message_stop`.
///
/// Each event is yielded as its own chunk so it flushes independently.
/// `on_complete` fires once with the usage seen in the final chunk.
pub fn create_claude_sse_stream<S, E>(
    upstream: S,
    model: String,
    on_complete: impl FnOnce(StreamUsage) + Send + 'static,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    let message_id = format!("msg_{}", Uuid::new_v4().simple());

    Box::pin(async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut buffer = BytesMut::new();
        let mut usage = StreamUsage::default();
        let mut stop_reason = "end_turn";

        yield Ok::<Bytes, String>(event("message_start", json!({
            "type": "message_start",
            "message": {
                "id": message_id,
                "type": "message",
                "role": "assistant",
                "model": model,
                "content": [],
                "usage": {"input_tokens": 0, "output_tokens": 0},
            },
        })));
        yield Ok(event("content_block_start", json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": ""},
        })));

        'relay: while let Some(item) = upstream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("upstream stream error: {}", e);
                    break 'relay;
                }
            };
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_raw = buffer.split_to(pos + 1);
                let Ok(line_str) = std::str::from_utf8(&line_raw) else {
                    continue;
                };
                let Some(chunk) = parse_stream_line(line_str.trim()) else {
                    continue;
                };

                if let Some((tokens_in, tokens_out)) = chunk.usage {
                    usage = StreamUsage { tokens_in, tokens_out };
                }
                if let Some(reason) = &chunk.finish_reason {
                    stop_reason = stop_reason_for(Some(reason.as_str()));
                }
                if chunk.text.is_empty() {
                    continue;
                }

                yield Ok(event("content_block_delta", json!({
                    "type": "content_block_delta",
                    "index": 0,
                    "delta": {"type": "text_delta", "text": chunk.text},
                })));
            }
        }

        yield Ok(event("content_block_stop", json!({
            "type": "content_block_stop",
            "index": 0,
        })));
        yield Ok(event("message_delta", json!({
            "type": "message_delta",
            "delta": {"stop_reason": stop_reason},
            "usage": {"output_tokens": usage.tokens_out},
        })));
        yield Ok(event("message_stop", json!({"type": "message_stop"})));

        on_complete(usage);
    })
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::mpsc;

    use gravity_types::protocol::gemini::{
        GeminiCandidate, GeminiCandidateContent, GeminiTextPart, GeminiUsageMetadata,
    };

    use super::*;

    fn gemini_response(text: &str, finish: Option<&str>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![GeminiCandidate {
                content: GeminiCandidateContent {
                    parts: vec![GeminiTextPart { text: text.to_string() }],
                },
                finish_reason: finish.map(str::to_string),
            }],
            usage_metadata: GeminiUsageMetadata {
                prompt_token_count: 9,
                candidates_token_count: 2,
                total_token_count: 11,
            },
        }
    }

    #[test]
    fn test_unary_conversion_shape() {
        let response =
            to_messages_response(&gemini_response("hello", Some("STOP")), "claude-sonnet-4-5");
        assert!(response.id.starts_with("msg_"));
        assert_eq!(response.kind, "message");
        assert_eq!(response.role, "assistant");
        assert_eq!(response.content[0].kind, "text");
        assert_eq!(response.content[0].text, "hello");
        assert_eq!(response.stop_reason, "end_turn");
        assert_eq!(response.usage.input_tokens, 9);
        assert_eq!(response.usage.output_tokens, 2);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(stop_reason_for(Some("STOP")), "end_turn");
        assert_eq!(stop_reason_for(Some("MAX_TOKENS")), "max_tokens");
        assert_eq!(stop_reason_for(Some("SAFETY")), "end_turn");
        assert_eq!(stop_reason_for(None), "end_turn");
    }

    fn upstream_lines(lines: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let chunks: Vec<Result<Bytes, Infallible>> = lines
            .iter()
            .map(|l| Ok(Bytes::from(format!("{l}\n"))))
            .collect();
        futures::stream::iter(chunks)
    }

    fn event_names(frames: &[String]) -> Vec<String> {
        frames
            .iter()
            .map(|f| {
                f.lines()
                    .next()
                    .and_then(|l| l.strip_prefix("event: "))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stream_event_sequence() {
        let upstream = upstream_lines(&[
            r#"data: {"candidates":[{"content":{"parts":[{"text":"he"}]}}]}"#,
            r#"data: {"candidates":[{"content":{"parts":[{"text":"llo"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":6}}"#,
        ]);

        let (tx, rx) = mpsc::channel();
        let stream =
            create_claude_sse_stream(upstream, "claude-sonnet-4-5".to_string(), move |usage| {
                tx.send(usage).unwrap();
            });
        let frames: Vec<String> = stream
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await;

        assert_eq!(
            event_names(&frames),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert!(frames[2].contains(r#""text":"he""#));
        assert!(frames[3].contains(r#""text":"llo""#));
        assert!(frames[5].contains(r#""stop_reason":"end_turn""#));
        assert!(frames.iter().all(|f| f.ends_with("\n\n")));

        let usage = rx.try_recv().unwrap();
        assert_eq!(usage.tokens_in, 4);
        assert_eq!(usage.tokens_out, 6);
    }

    #[tokio::test]
    async fn test_empty_stream_still_emits_full_envelope() {
        let upstream = upstream_lines(&[]);
        let stream =
            create_claude_sse_stream(upstream, "claude-sonnet-4-5".to_string(), |_| {});
        let frames: Vec<String> = stream
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await;
        assert_eq!(
            event_names(&frames),
            vec![
                "message_start",
                "content_block_start",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_chunks_do_not_tear_down_stream() {
        let upstream = upstream_lines(&[
            "data: {broken",
            r#"data: {"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
        ]);
        let stream =
            create_claude_sse_stream(upstream, "claude-sonnet-4-5".to_string(), |_| {});
        let frames: Vec<String> = stream
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await;
        assert_eq!(event_names(&frames).iter().filter(|n| *n == "content_block_delta").count(), 1);
        assert!(frames.last().unwrap().contains("message_stop"));
    }
}
