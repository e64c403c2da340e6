/// Truncator (C7): evicts a contiguous middle range of messages when the
/// previous request's measured token count exceeded the effective budget,
/// and rewrites the candidate edit log's indices to match.
///
/// Grounded on the teacher project's `budget.rs::trim_oldest_turns` — "never
/// drop the task, never drop the most recent turns" — generalized from a
/// fixed 4-message protected tail to the spec's `ceil(·φ)`-rounded-to-even
/// eviction count, and from an assistant+tool-pair drop to a plain
/// half-open-range eviction over the whole optimized history.
use crate::clock::Clock;
use crate::edit_log::{Edit, EditLog};
use crate::message::{RawMessage, Role};

/// Number of leading messages the Truncator never evicts (the first
/// user/assistant pair).
const PRESERVED_PREFIX: usize = 2;

pub struct TruncationResult {
    pub history: Vec<RawMessage>,
    pub log: EditLog,
    pub was_truncated: bool,
}

/// Run the Truncator. `phi` is the truncation fraction (spec default 0.5).
pub fn truncate(
    history: &[RawMessage],
    log: &EditLog,
    effective_max: u64,
    previous_request_tokens: u64,
    phi: f64,
    clock: &dyn Clock,
) -> TruncationResult {
    if previous_request_tokens <= effective_max {
        return TruncationResult {
            history: history.to_vec(),
            log: log.clone(),
            was_truncated: false,
        };
    }

    let n = history.len();
    if n <= PRESERVED_PREFIX {
        tracing::warn!(
            history_len = n,
            "history too short to evict anything; truncation is a no-op"
        );
        return TruncationResult {
            history: history.to_vec(),
            log: log.clone(),
            was_truncated: true,
        };
    }

    let evictable = n - PRESERVED_PREFIX;
    let raw_remove = (evictable as f64 * phi).ceil() as usize;
    let remove = round_up_to_even(raw_remove).min(evictable);

    let mut new_history = Vec::with_capacity(n - remove);
    new_history.extend_from_slice(&history[..PRESERVED_PREFIX]);
    new_history.extend_from_slice(&history[PRESERVED_PREFIX + remove..]);

    let mut new_log = log.shift_after_eviction(PRESERVED_PREFIX, remove);
    ensure_truncation_notice(history, &mut new_log, clock);

    TruncationResult {
        history: new_history,
        log: new_log,
        was_truncated: true,
    }
}

fn round_up_to_even(n: usize) -> usize {
    if n % 2 == 0 { n } else { n + 1 }
}

/// Ensure `(message index 1, block 0)` carries an `add_truncation_notice`
/// edit, unless it already ends in one — idempotence across consecutive
/// truncations with no new content in between.
fn ensure_truncation_notice(pre_truncation_history: &[RawMessage], log: &mut EditLog, clock: &dyn Clock) {
    const NOTICE_MESSAGE_INDEX: usize = 1;
    const NOTICE_BLOCK_INDEX: usize = 0;

    if pre_truncation_history.get(NOTICE_MESSAGE_INDEX).map(|m| m.role) != Some(Role::Assistant) {
        tracing::warn!(
            "message index 1 was not an assistant message before truncation; omitting notice"
        );
        return;
    }

    let already_noticed = log
        .last_edit(NOTICE_MESSAGE_INDEX, NOTICE_BLOCK_INDEX)
        .map(|e| e.kind == crate::edit_log::EditKind::AddTruncationNotice)
        .unwrap_or(false);
    if already_noticed {
        return;
    }

    log.append(
        NOTICE_MESSAGE_INDEX,
        NOTICE_BLOCK_INDEX,
        Role::Assistant,
        Edit::add_truncation_notice(clock.now_millis()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::apply;
    use crate::clock::FixedClock;
    use crate::notice::EnglishNoticeFormatter;

    fn alternating_history(n: usize) -> Vec<RawMessage> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                RawMessage::text(role, format!("msg {i}"))
            })
            .collect()
    }

    #[test]
    fn truncation_not_triggered_when_under_budget() {
        let history = alternating_history(10);
        let clock = FixedClock::new(1);
        let result = truncate(&history, &EditLog::new(), 100, 10, 0.5, &clock);
        assert!(!result.was_truncated);
        assert_eq!(result.history.len(), 10);
    }

    #[test]
    fn evicts_half_of_the_non_preserved_tail_rounded_up_to_even() {
        let history = alternating_history(10);
        let clock = FixedClock::new(1);
        let result = truncate(&history, &EditLog::new(), 13, 21, 0.5, &clock);
        assert!(result.was_truncated);
        // N=10, S=2, evictable=8, remove = ceil(8*0.5)=4, already even.
        assert_eq!(result.history.len(), 6);
        assert_eq!(result.history[0].content, history[0].content);
        assert_eq!(result.history[1].content, history[1].content);
        // tail messages 6..10 are now at positions 2..6
        assert_eq!(result.history[2].content, history[6].content);
        assert_eq!(result.history[5].content, history[9].content);
    }

    #[test]
    fn notice_is_inserted_on_first_assistant_message() {
        let history = alternating_history(10);
        let clock = FixedClock::new(42);
        let result = truncate(&history, &EditLog::new(), 13, 21, 0.5, &clock);

        let prepared = apply(&result.history, &result.log, &EnglishNoticeFormatter);
        let text = prepared[1].content.blocks().unwrap()[0].as_text().unwrap();
        assert!(text.starts_with(&EnglishNoticeFormatter.context_truncation_notice()));
    }

    #[test]
    fn prior_edits_above_the_evicted_range_are_shifted_down() {
        let history = alternating_history(10);
        let mut log = EditLog::new();
        log.append(9, 0, Role::Assistant, Edit::replace_content(1, "kept payload"));
        let clock = FixedClock::new(1);

        let result = truncate(&history, &log, 13, 21, 0.5, &clock);
        assert!(result.log.get(9).is_none());
        assert_eq!(
            result.log.last_edit(5, 0).unwrap().payload.as_deref(),
            Some("kept payload")
        );
        let prepared = apply(&result.history, &result.log, &EnglishNoticeFormatter);
        assert_eq!(
            prepared[5].content.blocks().unwrap()[0].as_text(),
            Some("kept payload")
        );
    }

    #[test]
    fn second_consecutive_truncation_does_not_double_insert_notice() {
        let history = alternating_history(10);
        let clock = FixedClock::new(1);
        let first = truncate(&history, &EditLog::new(), 13, 21, 0.5, &clock);

        // Second call over the already-truncated, already-noticed history.
        let second = truncate(&first.history, &first.log, 1, 1_000_000, 0.5, &clock);
        let prepared = apply(&second.history, &second.log, &EnglishNoticeFormatter);
        let text = prepared[1].content.blocks().unwrap()[0].as_text().unwrap();
        let notice = EnglishNoticeFormatter.context_truncation_notice();
        assert_eq!(text.matches(notice.as_str()).count(), 1);
    }

    #[test]
    fn history_too_short_to_evict_is_a_warned_no_op() {
        let history = alternating_history(2);
        let clock = FixedClock::new(1);
        let result = truncate(&history, &EditLog::new(), 1, 1_000_000, 0.5, &clock);
        assert!(result.was_truncated);
        assert_eq!(result.history.len(), 2);
    }
}
