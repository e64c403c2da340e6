/// Budget Oracle (C3): maps an optional model descriptor to a `(window,
/// effective_max)` pair under a fixed policy table.
///
/// Unlike the teacher project's `BudgetConfig` — which derives a usable
/// budget as a flat 15% response headroom off whatever context size the
/// active profile declares — this oracle follows the spec's per-window
/// table verbatim, including the apparent inconsistency the spec calls out
/// for the absent/zero case (see SPEC_FULL.md §9a Open Question decisions).
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

const DEFAULT_WINDOW: u64 = 128_000;

/// Opaque model descriptor; only the context window size is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub context_window: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetInfo {
    pub window: u64,
    pub effective_max: u64,
}

/// Tracks whether the "model info absent" warning has already fired once
/// for the current descriptor, so repeated `process` calls don't spam logs.
#[derive(Debug, Default)]
pub struct BudgetOracle {
    warned_absent: AtomicBool,
}

impl BudgetOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the one-shot "absent model info" warning — called when the
    /// embedder sets a new model descriptor, so absence of the *new* one
    /// is reported again.
    pub fn reset_warning(&self) {
        self.warned_absent.store(false, Ordering::SeqCst);
    }

    pub fn resolve(&self, descriptor: Option<&ModelDescriptor>) -> BudgetInfo {
        let context_window = descriptor.and_then(|d| d.context_window).filter(|w| *w != 0);

        if context_window.is_none() && !self.warned_absent.swap(true, Ordering::SeqCst) {
            tracing::warn!("model descriptor missing a context window; defaulting to 128000");
        }

        match context_window {
            None => BudgetInfo {
                window: DEFAULT_WINDOW,
                effective_max: DEFAULT_WINDOW - 30_000,
            },
            Some(64_000) => BudgetInfo {
                window: 64_000,
                effective_max: 64_000 - 27_000,
            },
            Some(128_000) => BudgetInfo {
                window: 128_000,
                effective_max: 128_000 - 30_000,
            },
            Some(200_000) => BudgetInfo {
                window: 200_000,
                effective_max: 200_000 - 40_000,
            },
            Some(w) => {
                let reserve = (0.20 * w as f64).max(40_000.0) as u64;
                let raw = w.saturating_sub(reserve);
                let floor = (w / 2).max(1_000);
                BudgetInfo {
                    window: w,
                    effective_max: raw.max(floor),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_descriptor_defaults_to_128k_minus_30k() {
        let oracle = BudgetOracle::new();
        let info = oracle.resolve(None);
        assert_eq!(info.window, 128_000);
        assert_eq!(info.effective_max, 98_000);
    }

    #[test]
    fn zero_context_window_is_treated_as_absent() {
        let oracle = BudgetOracle::new();
        let info = oracle.resolve(Some(&ModelDescriptor { context_window: Some(0) }));
        assert_eq!(info.effective_max, 98_000);
    }

    #[test]
    fn known_windows_match_the_policy_table() {
        let oracle = BudgetOracle::new();
        assert_eq!(
            oracle
                .resolve(Some(&ModelDescriptor { context_window: Some(64_000) }))
                .effective_max,
            37_000
        );
        assert_eq!(
            oracle
                .resolve(Some(&ModelDescriptor { context_window: Some(128_000) }))
                .effective_max,
            98_000
        );
        assert_eq!(
            oracle
                .resolve(Some(&ModelDescriptor { context_window: Some(200_000) }))
                .effective_max,
            160_000
        );
    }

    #[test]
    fn other_window_uses_twenty_percent_reserve_clamped() {
        let oracle = BudgetOracle::new();
        // W = 300_000: reserve = max(60_000, 40_000) = 60_000 -> 240_000, above floor
        let info = oracle.resolve(Some(&ModelDescriptor { context_window: Some(300_000) }));
        assert_eq!(info.effective_max, 240_000);

        // W = 10_000: reserve = max(2_000, 40_000) = 40_000 -> raw would underflow to 0,
        // clamp to max(0, 5_000, 1_000) = 5_000
        let info = oracle.resolve(Some(&ModelDescriptor { context_window: Some(10_000) }));
        assert_eq!(info.effective_max, 5_000);
    }

    #[test]
    fn absent_warning_fires_once_until_reset() {
        let oracle = BudgetOracle::new();
        assert!(!oracle.warned_absent.load(Ordering::SeqCst));
        oracle.resolve(None);
        assert!(oracle.warned_absent.load(Ordering::SeqCst));
        oracle.resolve(None); // no panic / observable effect either way
        oracle.reset_warning();
        assert!(!oracle.warned_absent.load(Ordering::SeqCst));
    }
}
