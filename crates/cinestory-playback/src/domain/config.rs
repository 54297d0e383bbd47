//! Timing configuration of a playback session.

use cinestory_core::clock::Millis;

/// Timing constants used by the engine. All values are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// How long one queued notice stays visible.
    pub notice_visible_ms: Millis,
    /// Gap between two queued notices.
    pub notice_gap_ms: Millis,
    /// Lifetime of an inline stat delta badge.
    pub inline_delta_ms: Millis,
    /// Relation triggers fire this long before a block's nominal end.
    pub relation_lead_ms: Millis,
    /// Duration of image blocks without an authored duration.
    pub default_block_ms: Millis,
    /// Decision timer tick interval.
    pub decision_tick_ms: Millis,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            notice_visible_ms: 3_000,
            notice_gap_ms: 500,
            inline_delta_ms: 3_000,
            relation_lead_ms: 3_000,
            default_block_ms: 5_000,
            decision_tick_ms: 1_000,
        }
    }
}
