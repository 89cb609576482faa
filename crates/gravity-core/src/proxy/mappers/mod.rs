//! Dialect translation between the inbound OpenAI/Anthropic shapes and the
//! Gemini upstream, shared across unary and streaming paths.

pub mod claude;
pub mod openai;

use gravity_types::protocol::gemini::{
    GeminiContent, GeminiInlineData, GeminiPart, GeminiSystemInstruction, GenerateContentRequest,
    GenerationConfig,
};
use gravity_types::protocol::{ChatMessage, ContentBlock, MessageContent};

/// Token usage observed on a stream, reported once the stream finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamUsage {
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Build the upstream request body from inbound chat messages.
///
/// `system` is the Anthropic top-level system field; system-role messages
/// in `messages` override it (last one wins). `user` maps to the Gemini
/// `user` role, `assistant` to `model`. Only `temperature > 0` and
/// `max_tokens > 0` are forwarded into the generation config.
pub fn build_gemini_request(
    messages: &[ChatMessage],
    system: Option<&str>,
    temperature: f64,
    max_tokens: u32,
) -> GenerateContentRequest {
    let mut system_text: Option<String> =
        system.filter(|s| !s.is_empty()).map(str::to_string);
    let mut contents = Vec::new();

    for message in messages {
        if message.role == "system" {
            if let Some(MessageContent::Text(text)) = &message.content {
                system_text = Some(text.clone());
            }
            continue;
        }

        let role = if message.role == "assistant" { "model" } else { "user" };
        let parts = match &message.content {
            Some(content) => content_to_parts(content),
            None => Vec::new(),
        };
        if parts.is_empty() {
            continue;
        }
        contents.push(GeminiContent { role: role.to_string(), parts });
    }

    let system_instruction = system_text.map(|text| GeminiSystemInstruction {
        parts: vec![GeminiPart::Text { text }],
    });

    let generation_config = if temperature > 0.0 || max_tokens > 0 {
        Some(GenerationConfig {
            temperature: (temperature > 0.0).then_some(temperature),
            max_output_tokens: (max_tokens > 0).then_some(max_tokens),
        })
    } else {
        None
    };

    GenerateContentRequest { contents, system_instruction, generation_config }
}

fn content_to_parts(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) => vec![GeminiPart::Text { text: text.clone() }],
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(GeminiPart::Text { text: text.clone() }),
                ContentBlock::ImageUrl { image_url } => data_uri_to_inline(&image_url.url),
                ContentBlock::Unsupported => None,
            })
            .collect(),
    }
}

/// Decode a `data:MIME;base64,DATA` URI into an inline-data part. Remote
/// URLs are dropped: the upstream expects inline bytes and this gateway
/// does not fetch on the client's behalf.
fn data_uri_to_inline(url: &str) -> Option<GeminiPart> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.split(';').next().unwrap_or_default();
    Some(GeminiPart::InlineData {
        inline_data: GeminiInlineData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        },
    })
}

/// One parsed chunk of the upstream SSE stream.
#[derive(Debug, Default)]
pub(crate) struct StreamChunk {
    pub text: String,
    pub usage: Option<(u32, u32)>,
    pub finish_reason: Option<String>,
}

/// Parse one line of the upstream SSE framing. Returns `None` for lines
/// that carry nothing to relay: non-`data:` lines, empty data, `[DONE]`,
/// and malformed JSON (skipped without tearing down the stream).
pub(crate) fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("skipping malformed stream chunk: {}", e);
            return None;
        }
    };

    let candidate = &value["candidates"][0];
    let text = candidate["content"]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let finish_reason = candidate["finishReason"].as_str().map(str::to_string);
    let usage = value.get("usageMetadata").map(|u| {
        (
            u["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            u["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        )
    });

    Some(StreamChunk { text, usage, finish_reason })
}
