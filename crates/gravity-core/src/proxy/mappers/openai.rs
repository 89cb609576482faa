//! Gemini → OpenAI response translation, unary and streaming.

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde_json::json;
use uuid::Uuid;

use gravity_types::protocol::gemini::GenerateContentResponse;
use gravity_types::protocol::openai::{
    AssistantMessage, ChatChoice, ChatCompletionResponse, ChatUsage,
};

use super::{parse_stream_line, StreamUsage};

/// Convert a unary Gemini response into an OpenAI chat completion.
pub fn to_chat_completion(
    response: &GenerateContentResponse,
    model: &str,
) -> ChatCompletionResponse {
    let mut content = String::new();
    let mut finish_reason = "stop".to_string();
    if let Some(candidate) = response.candidates.first() {
        if let Some(part) = candidate.content.parts.first() {
            content = part.text.clone();
        }
        if let Some(reason) = &candidate.finish_reason {
            finish_reason = reason.to_lowercase();
        }
    }

    let usage = response.usage_metadata;
    ChatCompletionResponse {
        id: format!("chatcmpl-{}", Uuid::new_v4()),
        object: "chat.completion",
        created: Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage { role: "assistant", content },
            finish_reason,
        }],
        usage: ChatUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.prompt_token_count + usage.candidates_token_count,
        },
    }
}

/// Relay a Gemini SSE stream as OpenAI `chat.completion.chunk` frames.
///
/// Every frame is yielded as its own chunk so it flushes to the client
/// independently; the stream always terminates with `data: [DONE]`.
/// `on_complete` fires once with the usage seen in the final chunk.
pub fn create_openai_sse_stream<S, E>(
    upstream: S,
    model: String,
    on_complete: impl FnOnce(StreamUsage) + Send + 'static,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    let stream_id = format!("chatcmpl-{}", Uuid::new_v4());
    let created = Utc::now().timestamp();

    Box::pin(async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut buffer = BytesMut::new();
        let mut usage = StreamUsage::default();
        let mut finish_reason = "stop".to_string();
        let mut first_delta = true;

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
                if let Some(reason) = chunk.finish_reason {
                    finish_reason = reason.to_lowercase();
                }
                if chunk.text.is_empty() {
                    continue;
                }

                let delta = if first_delta {
                    first_delta = false;
                    json!({"role": "assistant", "content": chunk.text})
                } else {
                    json!({"content": chunk.text})
                };
                let frame = json!({
                    "id": stream_id,
                    "object": "chat.completion.chunk",
                    "created": created,
                    "model": model,
                    "choices": [{"index": 0, "delta": delta, "finish_reason": null}],
                });
                yield Ok::<Bytes, String>(Bytes::from(format!("data: {}\n\n", frame)));
            }
        }

        let final_frame = json!({
            "id": stream_id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{"index": 0, "delta": {}, "finish_reason": finish_reason}],
        });
        yield Ok(Bytes::from(format!("data: {}\n\n", final_frame)));
        yield Ok(Bytes::from("data: [DONE]\n\n"));

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
                prompt_token_count: 3,
                candidates_token_count: 4,
                total_token_count: 7,
            },
        }
    }

    #[test]
    fn test_unary_conversion_shape() {
        let response = to_chat_completion(&gemini_response("hi there", Some("STOP")), "gpt-4");
        assert!(response.id.starts_with("chatcmpl-"));
        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.model, "gpt-4");
        assert_eq!(response.choices[0].message.content, "hi there");
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.usage.prompt_tokens, 3);
        assert_eq!(response.usage.completion_tokens, 4);
        assert_eq!(response.usage.total_tokens, 7);
    }

    #[test]
    fn test_finish_reason_lowercased() {
        let response =
            to_chat_completion(&gemini_response("x", Some("MAX_TOKENS")), "gpt-4");
        assert_eq!(response.choices[0].finish_reason, "max_tokens");

        let empty = to_chat_completion(&GenerateContentResponse::default(), "gpt-4");
        assert_eq!(empty.choices[0].finish_reason, "stop");
        assert_eq!(empty.choices[0].message.content, "");
    }

    fn upstream_lines(lines: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let chunks: Vec<Result<Bytes, Infallible>> = lines
            .iter()
            .map(|l| Ok(Bytes::from(format!("{l}\n"))))
            .collect();
        futures::stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_stream_relays_deltas_and_terminates() {
        let upstream = upstream_lines(&[
            r#"data: {"candidates":[{"content":{"parts":[{"text":"he"}]}}]}"#,
            ": heartbeat",
            "data: {broken json",
            r#"data: {"candidates":[{"content":{"parts":[{"text":"llo"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":2,"candidatesTokenCount":5}}"#,
        ]);

        let (tx, rx) = mpsc::channel();
        let stream = create_openai_sse_stream(upstream, "gpt-4".to_string(), move |usage| {
            tx.send(usage).unwrap();
        });
        let frames: Vec<String> = stream
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await;

        // Two deltas, one finish frame, one [DONE].
        assert_eq!(frames.len(), 4);
        assert!(frames[0].contains(r#""content":"he""#));
        assert!(frames[0].contains(r#""role":"assistant""#));
        assert!(frames[1].contains(r#""content":"llo""#));
        assert!(!frames[1].contains("role"));
        assert!(frames[2].contains(r#""finish_reason":"stop""#));
        assert_eq!(frames[3], "data: [DONE]\n\n");
        assert!(frames.iter().all(|f| f.ends_with("\n\n")));

        let usage = rx.try_recv().unwrap();
        assert_eq!(usage.tokens_in, 2);
        assert_eq!(usage.tokens_out, 5);
    }

    #[tokio::test]
    async fn test_stream_split_across_byte_chunks() {
        let full = r#"data: {"candidates":[{"content":{"parts":[{"text":"split"}]}}]}"#;
        let (a, b) = full.split_at(25);
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from(a.to_string())),
            Ok(Bytes::from(format!("{b}\n"))),
        ];
        let stream = create_openai_sse_stream(
            futures::stream::iter(chunks),
            "gpt-4".to_string(),
            |_| {},
        );
        let frames: Vec<String> = stream
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await;
        assert!(frames[0].contains("split"));
    }
}
