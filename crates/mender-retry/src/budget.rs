//! Retry budget — the bounded counter persisted in a policy's status.

use tracing::{debug, warn};

/// Tracks consecutive failure-triggered retries for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    max: u32,
}

impl RetryBudget {
    /// Start from a persisted count. A count above `max` (the limit was
    /// lowered since it was written) is pulled back down to `max`.
    pub fn new(used: u32, max: u32) -> Self {
        if used > max {
            warn!(used, max, "persisted retry count above limit, clamping");
        }
        Self {
            used: used.min(max),
            max,
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn remaining(&self) -> u32 {
        self.max - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }

    /// Charge one retry. Returns false, without charging, when exhausted.
    pub fn consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        if self.is_exhausted() {
            debug!(max = self.max, "retry budget exhausted");
        }
        true
    }

    /// Restore the full budget. Returns true if anything was spent.
    pub fn reset(&mut self) -> bool {
        let was_spent = self.used > 0;
        self.used = 0;
        was_spent
    }
}
