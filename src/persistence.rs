/// Persistence Port (C2): load/store the Edit Log for a task id.
///
/// Grounded on the teacher project's `sessions.rs` per-task file layout and
/// its `Result`-returning, best-effort persistence helpers, and on
/// `telemetry.rs`'s split between a public infallible wrapper and a private
/// fallible helper — the policy this crate follows for every persistence
/// call: log and continue, never propagate to `Manager::process`'s caller.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::edit_log::{Edit, EditKind, EditLog, EditMetadata, MessageEdits};
use crate::message::Role;

/// Fixed file name under each task's directory, per SPEC_FULL.md §6.
const EDIT_LOG_FILE_NAME: &str = "edit_log.json";

pub trait EditLogStore: Send + Sync {
    /// Returns an empty log if no record exists or it cannot be decoded.
    fn load(&self, task_id: &str) -> EditLog;
    /// Best-effort durable write; failures are logged, never propagated.
    fn store(&self, task_id: &str, log: &EditLog);
}

/// One JSON file per task under `base_dir/<task_id>/edit_log.json`.
#[derive(Debug, Clone)]
pub struct FileEditLogStore {
    base_dir: PathBuf,
}

impl FileEditLogStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, task_id: &str) -> PathBuf {
        self.base_dir.join(task_id).join(EDIT_LOG_FILE_NAME)
    }
}

impl EditLogStore for FileEditLogStore {
    fn load(&self, task_id: &str) -> EditLog {
        let path = self.path_for(task_id);
        match try_load(&path) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(task_id, error = %e, "failed to load edit log; starting empty");
                EditLog::new()
            }
        }
    }

    fn store(&self, task_id: &str, log: &EditLog) {
        let path = self.path_for(task_id);
        if let Err(e) = try_store(&path, log) {
            tracing::warn!(task_id, error = %e, "failed to persist edit log");
        }
    }
}

fn try_load(path: &Path) -> Result<EditLog> {
    if !path.exists() {
        return Ok(EditLog::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let dump: Value = serde_json::from_str(&raw).with_context(|| "parsing edit log JSON")?;
    Ok(decode_dump(&dump))
}

fn try_store(path: &Path, log: &EditLog) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let dump = encode_dump(log);
    let text = serde_json::to_string_pretty(&dump)?;
    fs::write(path, text)?;
    Ok(())
}

// ── On-disk encoding: numeric keys as strings, edits as 3/4-element tuples ──

fn encode_dump(log: &EditLog) -> Value {
    let mut messages = serde_json::Map::new();
    for (idx, entry) in log.iter() {
        let mut blocks = serde_json::Map::new();
        for (block_idx, edits) in entry.blocks.iter() {
            let tuples: Vec<Value> = edits.iter().map(encode_edit).collect();
            blocks.insert(block_idx.to_string(), Value::Array(tuples));
        }
        let mut obj = serde_json::Map::new();
        obj.insert(
            "editType".to_string(),
            entry
                .edit_type
                .map(|r| Value::String(role_to_str(r).to_string()))
                .unwrap_or(Value::Null),
        );
        obj.insert("blocks".to_string(), Value::Object(blocks));
        messages.insert(idx.to_string(), Value::Object(obj));
    }
    Value::Object(messages)
}

fn encode_edit(edit: &Edit) -> Value {
    let kind = match edit.kind {
        EditKind::ReplaceContent => "replace_content",
        EditKind::AddTruncationNotice => "add_truncation_notice",
        EditKind::Other => "other",
    };
    let payload = edit
        .payload
        .clone()
        .map(Value::String)
        .unwrap_or(Value::Null);

    if edit.metadata.is_empty() {
        Value::Array(vec![
            Value::from(edit.timestamp),
            Value::String(kind.to_string()),
            payload,
        ])
    } else {
        let mut meta = serde_json::Map::new();
        if let Some(p) = &edit.metadata.original_path {
            meta.insert("originalPath".to_string(), Value::String(p.clone()));
        }
        if let Some(b) = edit.metadata.replaced_mention {
            meta.insert("replacedMention".to_string(), Value::Bool(b));
        }
        Value::Array(vec![
            Value::from(edit.timestamp),
            Value::String(kind.to_string()),
            payload,
            Value::Object(meta),
        ])
    }
}

fn role_to_str(r: Role) -> &'static str {
    match r {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn role_from_str(s: &str) -> Option<Role> {
    match s {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

/// Decode a dump, dropping malformed entries with a warning rather than
/// failing the whole load (§6: "decoding is lenient").
fn decode_dump(dump: &Value) -> EditLog {
    let mut log = EditLog::new();
    let Some(messages) = dump.as_object() else {
        tracing::warn!("edit log dump is not a JSON object; starting empty");
        return log;
    };

    for (key, value) in messages.iter() {
        let Ok(msg_idx) = key.parse::<usize>() else {
            tracing::warn!(key, "non-numeric message key in edit log dump; dropping");
            continue;
        };
        let Some(obj) = value.as_object() else { continue };
        let edit_type = obj
            .get("editType")
            .and_then(Value::as_str)
            .and_then(role_from_str);
        let Some(blocks) = obj.get("blocks").and_then(Value::as_object) else { continue };

        let mut decoded_blocks = BTreeMap::new();
        for (block_key, edits_value) in blocks.iter() {
            let Ok(block_idx) = block_key.parse::<usize>() else {
                tracing::warn!(block_key, "non-numeric block key in edit log dump; dropping");
                continue;
            };
            let Some(arr) = edits_value.as_array() else { continue };
            let decoded: Vec<Edit> = arr.iter().filter_map(decode_edit).collect();
            if !decoded.is_empty() {
                decoded_blocks.insert(block_idx, decoded);
            }
        }

        if !decoded_blocks.is_empty() {
            log.set_raw(msg_idx, MessageEdits {
                edit_type,
                blocks: decoded_blocks,
            });
        }
    }

    log
}

fn decode_edit(value: &Value) -> Option<Edit> {
    let arr = value.as_array()?;
    if arr.len() < 3 {
        tracing::warn!("malformed edit tuple (fewer than 3 elements); dropping");
        return None;
    }
    let timestamp = arr[0].as_i64()?;
    let kind = match arr[1].as_str()? {
        "replace_content" => EditKind::ReplaceContent,
        "add_truncation_notice" => EditKind::AddTruncationNotice,
        "other" => EditKind::Other,
        other => {
            tracing::warn!(kind = other, "unknown edit kind in dump; dropping");
            return None;
        }
    };
    let payload = arr[2].as_str().map(str::to_string);
    let metadata = arr
        .get(3)
        .and_then(Value::as_object)
        .map(|m| EditMetadata {
            original_path: m.get("originalPath").and_then(Value::as_str).map(str::to_string),
            replaced_mention: m.get("replacedMention").and_then(Value::as_bool),
        })
        .unwrap_or_default();

    Some(Edit {
        timestamp,
        kind,
        payload,
        metadata,
    })
}
