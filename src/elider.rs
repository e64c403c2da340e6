/// Duplicate Elider (C6): scans the *raw* history for repeated file reads and
/// emits elision edits for every occurrence but the last.
///
/// Grounded on the teacher project's `cache.rs` re-read-prevention idea —
/// "don't pay context tokens twice for the same file" — reworked from a live
/// session cache into a retrospective scan over the whole raw history, since
/// this crate's edit log (not an in-memory cache) is the source of truth.
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::clock::Clock;
use crate::edit_log::{Edit, EditLog, EditMetadata};
use crate::message::{ContentBlock, MessageContent, RawMessage, Role};
use crate::notice::NoticeFormatter;

static TOOL_RESULT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[read_file for '([^']+)'\] Result:$").unwrap());

static FILE_CONTENT_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<file_content path="([^"]*)">([\s\S]*?)</file_content>"#).unwrap());

#[derive(Debug, Clone)]
enum Occurrence {
    /// Tool-result shape: block 1 of message `message_index` is the content
    /// block to elide.
    ToolResult { message_index: usize, block_index: usize },
    /// Mention shape: a `<file_content>` span inside a text block, replaced
    /// in place.
    Mention {
        message_index: usize,
        block_index: usize,
        full_match: String,
    },
}

/// Scan `history` for duplicate file-read occurrences and return `L_opt`: a
/// full copy of `live_log` ("seeded by the current live log") with one new
/// `replace_content` edit appended per elided occurrence. The returned log
/// already reflects every edit `live_log` held, with original timestamps
/// untouched — the caller can apply it directly instead of separately
/// applying `live_log` and the new edits in sequence.
pub fn elide_duplicates(
    history: &[RawMessage],
    live_log: &EditLog,
    clock: &dyn Clock,
    notices: &dyn NoticeFormatter,
) -> EditLog {
    // A `BTreeMap` keeps path order deterministic — relevant once occurrences
    // in different paths land in the same block (see the shared
    // `block_text_cache` below): without it, which elision "wins" a block
    // would depend on hash iteration order.
    let mut by_path: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

    for (msg_idx, message) in history.iter().enumerate() {
        if message.role != Role::User {
            continue;
        }
        match &message.content {
            MessageContent::Blocks(blocks) => {
                if let (Some(ContentBlock::Text { text }), Some(_second)) =
                    (blocks.first(), blocks.get(1))
                {
                    if let Some(caps) = TOOL_RESULT_HEADER.captures(text.trim_end()) {
                        let path = caps[1].to_string();
                        by_path.entry(path).or_default().push(Occurrence::ToolResult {
                            message_index: msg_idx,
                            block_index: 1,
                        });
                    }
                }

                for (block_idx, block) in blocks.iter().enumerate() {
                    let ContentBlock::Text { text } = block else { continue };
                    for caps in FILE_CONTENT_MENTION.captures_iter(text) {
                        let path = caps[1].to_string();
                        let full_match = caps[0].to_string();
                        by_path.entry(path).or_default().push(Occurrence::Mention {
                            message_index: msg_idx,
                            block_index: block_idx,
                            full_match,
                        });
                    }
                }
            }
            // Tool-result shape needs a second block and never applies here;
            // mention shape treats the bare string as a single block 0.
            MessageContent::Legacy(text) => {
                for caps in FILE_CONTENT_MENTION.captures_iter(text) {
                    let path = caps[1].to_string();
                    let full_match = caps[0].to_string();
                    by_path.entry(path).or_default().push(Occurrence::Mention {
                        message_index: msg_idx,
                        block_index: 0,
                        full_match,
                    });
                }
            }
        }
    }

    let timestamp = clock.now_millis();
    let mut candidate = live_log.clone();
    // Mention-shape replacements for the same `(message_index, block_index)`
    // must chain off each other's output, not the pre-call snapshot, or a
    // later replacement in the same block silently undoes an earlier one
    // once only the block's last edit is applied. Seeded lazily from
    // `live_log`/the raw block the first time a block is touched.
    let mut block_text_cache: HashMap<(usize, usize), String> = HashMap::new();

    for (path, occurrences) in by_path.iter() {
        if occurrences.len() < 2 {
            continue;
        }
        // Keep the last occurrence untouched; elide every prior one.
        for occurrence in &occurrences[..occurrences.len() - 1] {
            match occurrence {
                Occurrence::ToolResult { message_index, block_index } => {
                    let role = history[*message_index].role;
                    candidate.append(
                        *message_index,
                        *block_index,
                        role,
                        Edit::replace_content(timestamp, notices.duplicate_file_read_notice()),
                    );
                }
                Occurrence::Mention {
                    message_index,
                    block_index,
                    full_match,
                } => {
                    let key = (*message_index, *block_index);
                    let current_text = block_text_cache
                        .entry(key)
                        .or_insert_with(|| current_block_text(history, live_log, *message_index, *block_index))
                        .clone();
                    let replacement = format!(
                        "<file_content path=\"{path}\">{}</file_content>",
                        notices.duplicate_file_read_notice()
                    );
                    let new_text = current_text.replacen(full_match.as_str(), &replacement, 1);
                    block_text_cache.insert(key, new_text.clone());
                    let role = history[*message_index].role;
                    candidate.append(
                        *message_index,
                        *block_index,
                        role,
                        Edit::replace_content_with_metadata(
                            timestamp,
                            new_text,
                            EditMetadata {
                                original_path: Some(path.clone()),
                                replaced_mention: Some(true),
                            },
                        ),
                    );
                }
            }
        }
    }

    candidate
}

/// The text currently in effect for `(message_index, block_index)`: the
/// latest edit's payload if one exists, else the raw block's text.
fn current_block_text(
    history: &[RawMessage],
    live_log: &EditLog,
    message_index: usize,
    block_index: usize,
) -> String {
    if let Some(edit) = live_log.last_edit(message_index, block_index) {
        if let Some(payload) = &edit.payload {
            return payload.clone();
        }
    }
    match &history[message_index].content {
        MessageContent::Blocks(blocks) => blocks
            .get(block_index)
            .and_then(ContentBlock::as_text)
            .unwrap_or_default()
            .to_string(),
        MessageContent::Legacy(text) => text.clone(),
    }
}
