/// Wall-clock capability used to timestamp edits. Monotonicity is not
/// required — only a consistent ordering within a single `process` call is
/// relied on — but injecting it behind a trait lets tests pin exact values
/// instead of pulling in a clock-mocking crate.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fixed-value clock for tests — every call returns the same instant unless
/// advanced explicitly.
#[derive(Debug)]
pub struct FixedClock {
    millis: std::sync::atomic::AtomicI64,
}

impl FixedClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: std::sync::atomic::AtomicI64::new(millis),
        }
    }

    pub fn advance(&self, by: i64) {
        self.millis
            .fetch_add(by, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(std::sync::atomic::Ordering::SeqCst)
    }
}
