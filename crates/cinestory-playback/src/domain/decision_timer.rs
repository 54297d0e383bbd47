//! Per-activation countdown that auto-resolves an unanswered choice menu.

use cinestory_core::clock::Millis;

/// What a tick did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time remains; schedule the next tick.
    Running,
    /// The countdown reached zero for the first time.
    Expired,
    /// The countdown already expired; nothing to do.
    Spent,
}

/// Countdown with a one-shot expiry latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTimer {
    total_ms: Millis,
    elapsed_ms: Millis,
    fired: bool,
}

impl DecisionTimer {
    /// Starts a countdown of `seconds`.
    #[must_use]
    pub fn new(seconds: u32) -> Self {
        Self {
            total_ms: Millis::from(seconds) * 1_000,
            elapsed_ms: 0,
            fired: false,
        }
    }

    /// Counts down by `step`. Only the first tick that reaches zero reports
    /// `Expired`, however many ticks are delivered afterwards.
    pub fn tick(&mut self, step: Millis) -> TickOutcome {
        if self.fired {
            return TickOutcome::Spent;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(step).min(self.total_ms);
        if self.elapsed_ms < self.total_ms {
            return TickOutcome::Running;
        }
        self.fired = true;
        TickOutcome::Expired
    }

    /// Whether the expiry latch is set.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Remaining whole seconds.
    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        (self.total_ms - self.elapsed_ms).div_ceil(1_000)
    }

    /// Remaining fraction of the countdown, from 1.0 down to 0.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn remaining_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        (self.total_ms - self.elapsed_ms) as f64 / self.total_ms as f64
    }
}
