//! Context window manager: a duplicate-read elision, reactive-truncation and
//! reversible edit log layered over an immutable conversation history.
//!
//! The raw message history an embedder holds is never mutated. Instead every
//! change — duplicate file reads collapsed, a truncation notice inserted, a
//! message's tail evicted — is recorded as a timestamped [`edit_log::Edit`]
//! against a `(message index, block index)` pair, and [`applier::apply`]
//! projects raw history + edit log into the history actually sent to a
//! model. [`manager::Manager`] is the facade an embedder drives: one
//! `process` call per request, plus `update_model` and
//! `rollback_at_timestamp`.

mod applier;
mod budget;
mod clock;
mod edit_log;
mod elider;
mod manager;
mod message;
mod notice;
mod persistence;
mod tokens;
mod truncator;

pub use applier::apply;
pub use budget::{BudgetInfo, BudgetOracle, ModelDescriptor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use edit_log::{Edit, EditKind, EditLog, EditMetadata, MessageEdits};
pub use elider::elide_duplicates;
pub use manager::{Manager, ManagerConfig, ProcessResult};
pub use message::{ContentBlock, MessageContent, RawHistory, RawMessage, Role, ToolResultContent};
pub use notice::{EnglishNoticeFormatter, NoticeFormatter};
pub use persistence::{EditLogStore, FileEditLogStore};
pub use tokens::{DefaultTokenizer, Tokenizer, IMAGE_TOKEN_ESTIMATE};
pub use truncator::truncate;
