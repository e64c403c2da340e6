/// Manager Facade (C8): orchestrates Persistence → Duplicate Elider → Edit
/// Applier → Truncator → Edit Applier, and exposes the three operations an
/// embedder calls per task: `process`, `update_model`, `rollback_at_timestamp`.
///
/// Grounded on the teacher project's `agent.rs` orchestration shape (budget,
/// cache and history wired together behind one loop) and `sessions.rs`'s
/// stateful-struct-with-lifecycle-methods pattern for a facade that owns one
/// task's mutable state.
use crate::applier::apply;
use crate::budget::{BudgetOracle, ModelDescriptor};
use crate::clock::{Clock, SystemClock};
use crate::edit_log::EditLog;
use crate::elider::elide_duplicates;
use crate::message::RawMessage;
use crate::notice::{EnglishNoticeFormatter, NoticeFormatter};
use crate::persistence::EditLogStore;
use crate::tokens::{estimate_history, DefaultTokenizer, Tokenizer};
use crate::truncator::truncate;

/// Configuration fixed at `Manager` construction time — the ambient
/// "configuration layer" SPEC_FULL.md §9a calls for, as a plain struct
/// assembled once rather than a loaded file (file loading is the
/// embedder's job).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub task_id: String,
    /// Fraction of the evictable tail removed on truncation (spec default 0.5).
    pub truncation_fraction: f64,
    /// Tokens reserved for the model's response, subtracted from `effective_max`.
    pub reserved_response_tokens: u64,
    /// Extra safety margin subtracted from `effective_max`.
    pub token_buffer: u64,
}

impl ManagerConfig {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            truncation_fraction: 0.5,
            reserved_response_tokens: 0,
            token_buffer: 0,
        }
    }
}

/// Outcome of one [`Manager::process`] call — the full tuple SPEC_FULL.md
/// §4.8 documents (`{ prepared_history, log, tokens_used, was_truncated }`).
/// `log` is the edit log the prepared history was produced against: a clone
/// of [`Manager::live_log`] at the moment `process` returned.
pub struct ProcessResult {
    pub prepared_history: Vec<RawMessage>,
    pub log: EditLog,
    pub tokens_used: u64,
    pub was_truncated: bool,
}

pub struct Manager {
    config: ManagerConfig,
    live_log: EditLog,
    model: Option<ModelDescriptor>,
    budget_oracle: BudgetOracle,
    tokenizer: Box<dyn Tokenizer>,
    clock: Box<dyn Clock>,
    notices: Box<dyn NoticeFormatter>,
    store: Box<dyn EditLogStore>,
}

impl Manager {
    /// Load the live log from `store` for `config.task_id` and construct a
    /// manager using the default tokenizer, system clock and English notices.
    pub fn new(config: ManagerConfig, store: Box<dyn EditLogStore>) -> Self {
        Self::with_capabilities(
            config,
            store,
            Box::new(DefaultTokenizer),
            Box::new(SystemClock),
            Box::new(EnglishNoticeFormatter),
        )
    }

    pub fn with_capabilities(
        config: ManagerConfig,
        store: Box<dyn EditLogStore>,
        tokenizer: Box<dyn Tokenizer>,
        clock: Box<dyn Clock>,
        notices: Box<dyn NoticeFormatter>,
    ) -> Self {
        let live_log = store.load(&config.task_id);
        Self {
            config,
            live_log,
            model: None,
            budget_oracle: BudgetOracle::new(),
            tokenizer,
            clock,
            notices,
            store,
        }
    }

    pub fn live_log(&self) -> &EditLog {
        &self.live_log
    }

    /// Store a new model descriptor iff it differs structurally from the
    /// current one.
    pub fn update_model(&mut self, descriptor: ModelDescriptor) {
        if self.model != Some(descriptor) {
            tracing::info!(task_id = %self.config.task_id, "model descriptor changed");
            self.model = Some(descriptor);
            self.budget_oracle.reset_warning();
        }
    }

    /// Prepare `raw_history` for submission: elide duplicate file reads,
    /// truncate if the previous request overflowed the effective budget,
    /// and persist the edit log if it changed.
    pub fn process(&mut self, raw_history: &[RawMessage], prev_request_tokens: u64) -> ProcessResult {
        // L_opt: the live log seeded with any newly-discovered elisions.
        let candidate = elide_duplicates(
            raw_history,
            &self.live_log,
            self.clock.as_ref(),
            self.notices.as_ref(),
        );
        let optimized = apply(raw_history, &candidate, self.notices.as_ref());

        let budget = self.budget_oracle.resolve(self.model.as_ref());
        let reserved = self.config.reserved_response_tokens + self.config.token_buffer;
        let Some(effective_budget) = budget.effective_max.checked_sub(reserved).filter(|b| *b > 0) else {
            tracing::error!(
                task_id = %self.config.task_id,
                effective_max = budget.effective_max,
                reserved,
                "effective budget is non-positive; returning raw history untouched"
            );
            return ProcessResult {
                prepared_history: raw_history.to_vec(),
                log: self.live_log.clone(),
                tokens_used: estimate_history(self.tokenizer.as_ref(), raw_history) as u64,
                was_truncated: false,
            };
        };

        let truncation = truncate(
            &optimized,
            &candidate,
            effective_budget,
            prev_request_tokens,
            self.config.truncation_fraction,
            self.clock.as_ref(),
        );

        let prepared = apply(&truncation.history, &truncation.log, self.notices.as_ref());
        let tokens_used = estimate_history(self.tokenizer.as_ref(), &prepared) as u64;

        // `truncation.log` is L_final: `candidate` untouched when truncation
        // didn't trigger, or re-indexed with a notice edit folded in when it
        // did. Either way it is already a complete log, not a delta.
        if truncation.log != self.live_log {
            self.live_log = truncation.log;
            self.store.store(&self.config.task_id, &self.live_log);
        }

        ProcessResult {
            prepared_history: prepared,
            log: self.live_log.clone(),
            tokens_used,
            was_truncated: truncation.was_truncated,
        }
    }

    /// Remove every edit with `timestamp > t` from the live log, persisting
    /// the result if anything changed.
    pub fn rollback_at_timestamp(&mut self, t: i64) {
        if self.live_log.rollback(t) {
            self.store.store(&self.config.task_id, &self.live_log);
        }
    }
}
