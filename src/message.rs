/// Raw conversation message types.
///
/// The raw history is supplied by the embedding application and never mutated
/// by this crate — preparation only ever produces a new, separate sequence of
/// messages. See [`crate::applier`] for the projection that does that.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single content unit inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image,
    ToolUse { name: String, input: Value },
    ToolResult { content: ToolResultContent },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut String> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// `tool_result` content may be a plain string or a structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Structured(Value),
}

/// A message's content: either a list of blocks, or the legacy bare-string shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Blocks(Vec<ContentBlock>),
    Legacy(String),
}

impl MessageContent {
    pub fn blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            MessageContent::Blocks(b) => Some(b),
            MessageContent::Legacy(_) => None,
        }
    }

    pub fn blocks_mut(&mut self) -> Option<&mut Vec<ContentBlock>> {
        match self {
            MessageContent::Blocks(b) => Some(b),
            MessageContent::Legacy(_) => None,
        }
    }

    /// A mutable handle to the text addressed by `block_index`, treating a
    /// legacy bare string as a single block 0 (SPEC_FULL.md §3: the Elider
    /// and Applier both address it this way for mention-shape elision).
    /// `None` if `block_index` doesn't resolve to a text block.
    pub fn text_block_mut(&mut self, block_index: usize) -> Option<&mut String> {
        match self {
            MessageContent::Blocks(blocks) => blocks.get_mut(block_index)?.as_text_mut(),
            MessageContent::Legacy(text) => (block_index == 0).then_some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl RawMessage {
    pub fn new(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentBlock::text(text)])
    }
}

pub type RawHistory = Vec<RawMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_content_round_trips() {
        let msg = RawMessage {
            role: Role::User,
            content: MessageContent::Legacy("hi".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: RawMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn block_content_round_trips() {
        let msg = RawMessage::new(
            Role::Assistant,
            vec![
                ContentBlock::text("hello"),
                ContentBlock::ToolUse {
                    name: "read_file".to_string(),
                    input: serde_json::json!({"path": "a.rs"}),
                },
            ],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: RawMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
