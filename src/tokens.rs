/// Token estimation (C4): a deterministic, total cost function over a
/// prepared history, plus the [`Tokenizer`] capability it delegates plain
/// text to.
use crate::message::{ContentBlock, MessageContent, RawMessage, ToolResultContent};

/// Per-call overhead baked into the default tokenizer's estimate, covering
/// role/formatting tokens a real tokenizer would also charge for.
const DEFAULT_TOKENIZER_OVERHEAD: usize = 10;

/// Fixed per-block cost for an image — an estimate, not a claim of fidelity
/// to any particular vision model's accounting. See SPEC_FULL.md Open Questions.
pub const IMAGE_TOKEN_ESTIMATE: usize = 1_500;

/// Fixed per-block overhead added to `tool_use`/`tool_result` blocks on top
/// of their serialized content, in the teacher project's own estimator.
const TOOL_BLOCK_OVERHEAD: usize = 20;

/// A pure, total function `text -> token count`. Supplied by the embedding
/// application in production (its real tokenizer); this crate ships
/// [`DefaultTokenizer`] as a deterministic, dependency-free approximation.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Cheap approximation: 1 token ≈ 4 chars, plus a small fixed overhead.
/// Ported from the teacher project's `estimate_tokens`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count() / 4 + DEFAULT_TOKENIZER_OVERHEAD
    }
}

fn estimate_block(tokenizer: &dyn Tokenizer, block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text { text } => tokenizer.count(text),
        ContentBlock::Image => IMAGE_TOKEN_ESTIMATE,
        ContentBlock::ToolUse { name, input } => {
            let input_text = serde_json::to_string(input).unwrap_or_default();
            tokenizer.count(&input_text) + tokenizer.count(name) + TOOL_BLOCK_OVERHEAD
        }
        ContentBlock::ToolResult { content } => {
            let content_text = match content {
                ToolResultContent::Text(s) => s.clone(),
                ToolResultContent::Structured(v) => serde_json::to_string(v).unwrap_or_default(),
            };
            tokenizer.count(&content_text) + TOOL_BLOCK_OVERHEAD
        }
    }
}

pub fn estimate_message(tokenizer: &dyn Tokenizer, message: &RawMessage) -> usize {
    match &message.content {
        MessageContent::Legacy(text) => tokenizer.count(text),
        MessageContent::Blocks(blocks) => {
            blocks.iter().map(|b| estimate_block(tokenizer, b)).sum()
        }
    }
}

pub fn estimate_history(tokenizer: &dyn Tokenizer, history: &[RawMessage]) -> usize {
    history.iter().map(|m| estimate_message(tokenizer, m)).sum()
}
