/// The Edit Log: an ordered, timestamped record of mutations keyed by
/// `(message index, block index)`, overlaid on the immutable raw history.
///
/// Only the last edit of each `(message, block)` pair is ever applied (see
/// [`crate::applier`]); earlier edits are kept purely so [`EditLog::rollback`]
/// can walk the state machine backwards.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    ReplaceContent,
    AddTruncationNotice,
    Other,
}

/// Optional structured hints carried alongside an edit, e.g. for elision
/// bookkeeping (`replacedMention`, `originalPath`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_mention: Option<bool>,
}

impl EditMetadata {
    pub fn is_empty(&self) -> bool {
        self.original_path.is_none() && self.replaced_mention.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// Milliseconds since epoch at creation. Ordering within a block's list
    /// is by append order, not by this value — see module docs.
    pub timestamp: i64,
    pub kind: EditKind,
    /// New text for `replace_content`; absent for the other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "EditMetadata::is_empty")]
    pub metadata: EditMetadata,
}

impl Edit {
    pub fn replace_content(timestamp: i64, payload: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: EditKind::ReplaceContent,
            payload: Some(payload.into()),
            metadata: EditMetadata::default(),
        }
    }

    pub fn replace_content_with_metadata(
        timestamp: i64,
        payload: impl Into<String>,
        metadata: EditMetadata,
    ) -> Self {
        Self {
            timestamp,
            kind: EditKind::ReplaceContent,
            payload: Some(payload.into()),
            metadata,
        }
    }

    pub fn add_truncation_notice(timestamp: i64) -> Self {
        Self {
            timestamp,
            kind: EditKind::AddTruncationNotice,
            payload: None,
            metadata: EditMetadata::default(),
        }
    }
}

/// All edits recorded against one message: the role captured when the first
/// edit for that message was added (invariant 2 in the data model), plus a
/// per-block append-ordered edit list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEdits {
    pub edit_type: Option<Role>,
    pub blocks: BTreeMap<usize, Vec<Edit>>,
}

/// The Edit Log proper. A `BTreeMap` gives deterministic iteration, which
/// keeps the on-disk dump and test fixtures stable — the spec does not
/// require any particular order, only that outer/inner maps behave as maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditLog {
    messages: BTreeMap<usize, MessageEdits>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_index: usize) -> Option<&MessageEdits> {
        self.messages.get(&message_index)
    }

    /// Set the full entry for `message_index`, replacing any existing one.
    /// Used by the persistence adapter when reconstructing a log from disk.
    pub fn set_raw(&mut self, message_index: usize, entry: MessageEdits) {
        self.messages.insert(message_index, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &MessageEdits)> {
        self.messages.iter()
    }

    pub fn message_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.messages.keys().copied()
    }

    pub fn delete(&mut self, message_index: usize) {
        self.messages.remove(&message_index);
    }

    /// Last edit recorded for `(message_index, block_index)`, if any.
    pub fn last_edit(&self, message_index: usize, block_index: usize) -> Option<&Edit> {
        self.messages
            .get(&message_index)?
            .blocks
            .get(&block_index)?
            .last()
    }

    /// Append an edit for `(message_index, block_index)`, recording `role`
    /// as the message's `edit_type` the first time this message is touched.
    pub fn append(&mut self, message_index: usize, block_index: usize, role: Role, edit: Edit) {
        let entry = self.messages.entry(message_index).or_insert_with(|| MessageEdits {
            edit_type: Some(role),
            blocks: BTreeMap::new(),
        });
        entry.blocks.entry(block_index).or_default().push(edit);
    }

    /// Rewrite indices after evicting the half-open range `[start, start + removed)`:
    /// drop entries inside the range, shift entries above it down by `removed`.
    pub fn shift_after_eviction(&self, start: usize, removed: usize) -> EditLog {
        let mut out = EditLog::new();
        for (&idx, entry) in self.messages.iter() {
            if idx < start {
                out.messages.insert(idx, entry.clone());
            } else if idx >= start + removed {
                out.messages.insert(idx - removed, entry.clone());
            }
            // idx in [start, start+removed) is discarded.
        }
        out
    }

    /// Remove every edit with `timestamp > t`, pruning blocks/messages that
    /// become empty as a result. Returns `true` if anything changed.
    pub fn rollback(&mut self, t: i64) -> bool {
        let mut changed = false;
        let mut empty_messages = Vec::new();

        for (&msg_idx, entry) in self.messages.iter_mut() {
            let mut empty_blocks = Vec::new();
            for (&block_idx, edits) in entry.blocks.iter_mut() {
                let before = edits.len();
                edits.retain(|e| e.timestamp <= t);
                if edits.len() != before {
                    changed = true;
                }
                if edits.is_empty() {
                    empty_blocks.push(block_idx);
                }
            }
            for b in empty_blocks {
                entry.blocks.remove(&b);
            }
            if entry.blocks.is_empty() {
                empty_messages.push(msg_idx);
            }
        }
        for m in empty_messages {
            self.messages.remove(&m);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_records_edit_type_once() {
        let mut log = EditLog::new();
        log.append(0, 0, Role::User, Edit::replace_content(1, "a"));
        log.append(0, 0, Role::User, Edit::replace_content(2, "b"));
        let entry = log.get(0).unwrap();
        assert_eq!(entry.edit_type, Some(Role::User));
        assert_eq!(entry.blocks.get(&0).unwrap().len(), 2);
        assert_eq!(log.last_edit(0, 0).unwrap().payload.as_deref(), Some("b"));
    }

    #[test]
    fn shift_after_eviction_drops_range_and_shifts_tail() {
        let mut log = EditLog::new();
        log.append(0, 0, Role::User, Edit::replace_content(1, "keep"));
        log.append(3, 0, Role::User, Edit::replace_content(1, "drop"));
        log.append(9, 0, Role::Assistant, Edit::replace_content(1, "shift"));

        let shifted = log.shift_after_eviction(2, 4); // evict [2,6)
        assert!(shifted.get(0).is_some());
        assert!(shifted.get(3).is_none());
        assert!(shifted.get(9).is_none());
        assert_eq!(
            shifted.get(5).unwrap().blocks.get(&0).unwrap()[0].payload.as_deref(),
            Some("shift")
        );
    }

    #[test]
    fn rollback_prunes_empty_entries() {
        let mut log = EditLog::new();
        log.append(0, 0, Role::User, Edit::replace_content(1, "t1"));
        log.append(0, 0, Role::User, Edit::replace_content(3, "t3"));
        log.append(1, 0, Role::Assistant, Edit::add_truncation_notice(2));

        let changed = log.rollback(2);
        assert!(changed);
        assert_eq!(log.get(0).unwrap().blocks.get(&0).unwrap().len(), 1);
        assert_eq!(
            log.last_edit(0, 0).unwrap().timestamp,
            1
        );
        assert!(log.get(1).is_some());
    }

    #[test]
    fn rollback_removes_message_entry_when_all_blocks_empty() {
        let mut log = EditLog::new();
        log.append(0, 0, Role::User, Edit::replace_content(5, "only"));
        assert!(log.rollback(1));
        assert!(log.get(0).is_none());
    }

}
