/// Canonical notice strings. Supplied as a swappable formatter so they can be
/// localized — but the Truncator and Duplicate Elider depend on the *exact*
/// text for idempotence checks, so a custom formatter must keep the notice
/// stable across calls for the same instance.
pub trait NoticeFormatter: Send + Sync {
    /// Prepended by the Truncator to the retained first assistant message.
    fn context_truncation_notice(&self) -> String;
    /// Payload substituted for every elided-but-one duplicate file read.
    fn duplicate_file_read_notice(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishNoticeFormatter;

impl NoticeFormatter for EnglishNoticeFormatter {
    fn context_truncation_notice(&self) -> String {
        "[Earlier turns were truncated to stay within the context window.]".to_string()
    }

    fn duplicate_file_read_notice(&self) -> String {
        "[This file was read again later in the conversation; showing the later read instead of duplicating its content here.]".to_string()
    }
}
