//! Wire-protocol types for the three inbound dialects and the Gemini
//! upstream.
//!
//! OpenAI and Anthropic chat messages share the same string-or-array content
//! shape, so the content types live here and both dialects reuse them.

pub mod claude;
pub mod gemini;
pub mod openai;

use serde::{Deserialize, Serialize};

/// A chat message as sent by OpenAI- and Anthropic-dialect clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: either a plain string or an array of typed blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Concatenated text of the content; block arrays join their text
    /// blocks with a single space.
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One element of an array-form message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlSource },
    /// Any block type this gateway does not translate (tool use, documents…).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrlSource {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_deserializes_string_and_blocks() {
        let m: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert!(matches!(m.content, Some(MessageContent::Text(ref s)) if s == "hi"));

        let m: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":[
                {"type":"text","text":"a"},
                {"type":"image_url","image_url":{"url":"data:image/png;base64,AA=="}},
                {"type":"tool_use","id":"x"}
            ]}"#,
        )
        .unwrap();
        let Some(MessageContent::Blocks(blocks)) = m.content else {
            panic!("expected block content");
        };
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[2], ContentBlock::Unsupported));
    }

    #[test]
    fn test_content_text_joins_blocks() {
        let content = MessageContent::Blocks(vec![
            ContentBlock::Text { text: "plan".into() },
            ContentBlock::Unsupported,
            ContentBlock::Text { text: "my week".into() },
        ]);
        assert_eq!(content.text(), "plan my week");
    }
}
