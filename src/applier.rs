/// Edit Applier (C5): the pure projection `raw_history × edit_log →
/// prepared_history`. Never mutates its inputs; copies only the blocks whose
/// text actually changes.
use crate::edit_log::{EditKind, EditLog};
use crate::message::RawMessage;
use crate::notice::NoticeFormatter;

/// Apply `log` over `history`, producing a new, independent sequence.
/// Mismatches (invalid index, wrong block variant) are skipped with a
/// warning; the rest of the log still applies.
pub fn apply(
    history: &[RawMessage],
    log: &EditLog,
    notices: &dyn NoticeFormatter,
) -> Vec<RawMessage> {
    let mut out: Vec<RawMessage> = history.to_vec();

    for (&msg_idx, entry) in log.iter() {
        let Some(message) = out.get_mut(msg_idx) else {
            tracing::warn!(message_index = msg_idx, "edit references a non-existent message; skipping");
            continue;
        };

        for (&block_idx, edits) in entry.blocks.iter() {
            let Some(edit) = edits.last() else { continue };

            match edit.kind {
                EditKind::ReplaceContent => {
                    let Some(payload) = &edit.payload else {
                        tracing::warn!(
                            message_index = msg_idx,
                            block_index = block_idx,
                            "replace_content edit has no payload; skipping"
                        );
                        continue;
                    };
                    let Some(text) = message.content.text_block_mut(block_idx) else {
                        tracing::warn!(
                            message_index = msg_idx,
                            block_index = block_idx,
                            "replace_content targets a non-existent or non-text block; skipping"
                        );
                        continue;
                    };
                    *text = payload.clone();
                }
                EditKind::AddTruncationNotice => {
                    let Some(text) = message.content.text_block_mut(block_idx) else {
                        tracing::warn!(
                            message_index = msg_idx,
                            block_index = block_idx,
                            "add_truncation_notice targets a non-existent or non-text block; skipping"
                        );
                        continue;
                    };
                    let notice = notices.context_truncation_notice();
                    if !text.starts_with(&notice) {
                        *text = format!("{notice}\n{text}");
                    }
                }
                EditKind::Other => {
                    // Reserved, no-op.
                }
            }
        }
    }

    out
}
