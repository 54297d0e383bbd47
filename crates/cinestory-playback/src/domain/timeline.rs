//! Plays an ordered list of content blocks to exhaustion.
//!
//! Every block entry bumps the session epoch and schedules the block's own
//! timers (duration elapse, subtitle steps, relation triggers) under it, so
//! leaving a block early silently invalidates whatever it scheduled. The
//! epoch captured at entry doubles as the block's media cue.

use cinestory_content::domain::graph::{ContentBlock, MediaType};
use cinestory_core::clock::seconds_to_millis;
use tracing::debug;

use super::config::PlaybackConfig;
use super::session::{SessionContext, TimerKind};

/// Result of moving the timeline forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineStep {
    /// A new block became current.
    Entered,
    /// No blocks remain.
    Exhausted,
}

/// Playback position within one content list.
#[derive(Debug, Clone)]
pub struct Timeline {
    blocks: Vec<ContentBlock>,
    index: Option<usize>,
    cue: u64,
    subtitle: Option<String>,
}

impl Timeline {
    /// Wraps an already condition-filtered block list.
    #[must_use]
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            index: None,
            cue: 0,
            subtitle: None,
        }
    }

    /// Enters the first block, or reports exhaustion for an empty list.
    pub(crate) fn start(&mut self, ctx: &mut SessionContext, config: &PlaybackConfig) -> TimelineStep {
        self.enter(0, ctx, config)
    }

    /// Leaves the current block for the next one.
    pub(crate) fn advance(&mut self, ctx: &mut SessionContext, config: &PlaybackConfig) -> TimelineStep {
        let next = self.index.map_or(0, |index| index + 1);
        self.enter(next, ctx, config)
    }

    fn enter(&mut self, index: usize, ctx: &mut SessionContext, config: &PlaybackConfig) -> TimelineStep {
        self.subtitle = None;
        let Some(block) = self.blocks.get(index) else {
            self.index = None;
            ctx.mixer.stop_all();
            return TimelineStep::Exhausted;
        };

        self.index = Some(index);
        self.cue = ctx.bump_epoch();
        ctx.mixer.enter_block(&block.audio);

        let duration = block.duration_millis(config.default_block_ms);
        if block.media_type == MediaType::Image {
            ctx.schedule_in(duration, TimerKind::BlockElapsed);
        }

        let mut offset = 0;
        for (position, subtitle) in block.subtitles.iter().enumerate() {
            ctx.schedule_in(offset, TimerKind::ShowSubtitle(position));
            offset = offset.saturating_add(seconds_to_millis(subtitle.duration_seconds));
        }
        if !block.subtitles.is_empty() {
            ctx.schedule_in(offset, TimerKind::ClearSubtitle);
        }

        if block.has_relation_triggers() {
            let at = duration.saturating_sub(config.relation_lead_ms);
            ctx.schedule_in(at, TimerKind::RelationTriggers);
        }

        debug!(
            cue = self.cue,
            index,
            media_type = ?block.media_type,
            duration_ms = duration,
            "entered content block"
        );
        TimelineStep::Entered
    }

    /// Shows the subtitle at `position` of the current block. Returns the
    /// new text.
    pub(crate) fn show_subtitle(&mut self, position: usize) -> Option<&str> {
        let text = self.current()?.subtitles.get(position)?.text.clone();
        self.subtitle = Some(text);
        self.subtitle.as_deref()
    }

    /// Clears the subtitle region. Returns whether anything was visible.
    pub(crate) fn clear_subtitle(&mut self) -> bool {
        self.subtitle.take().is_some()
    }

    /// The current block.
    #[must_use]
    pub fn current(&self) -> Option<&ContentBlock> {
        self.index.and_then(|index| self.blocks.get(index))
    }

    /// Index of the current block.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Number of blocks in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the list has no blocks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Media cue of the current block.
    #[must_use]
    pub fn cue(&self) -> u64 {
        self.cue
    }

    /// Visible subtitle text.
    #[must_use]
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    /// Whether the current block waits for an external media-ended signal.
    #[must_use]
    pub fn awaits_media_end(&self) -> bool {
        self.current()
            .is_some_and(|block| block.media_type == MediaType::Video)
    }
}
