//! Render-state snapshots published to the presentation layer.

use cinestory_content::domain::graph::{CharacterProfile, MediaType};
use cinestory_core::ids::SceneId;
use serde::Serialize;
use uuid::Uuid;

use super::engine::Phase;
use super::notifications::Notice;

/// The descriptor of the block on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockView {
    /// Media cue to echo back in a media-ended signal.
    pub cue: u64,
    /// Image or video.
    pub media_type: MediaType,
    /// Asset reference.
    pub media_ref: Option<String>,
    /// Position in the active list.
    pub index: usize,
    /// Length of the active list.
    pub total: usize,
    /// Whether the block waits for a media-ended signal.
    pub awaits_media_end: bool,
}

/// A visible choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceView {
    /// Index within the scene's authored choice list.
    pub index: usize,
    /// Button text.
    pub text: String,
    /// Remaining decision time as a fraction, when a timer runs.
    pub remaining_ratio: Option<f64>,
}

/// Colour band of a relation display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// Below 25%.
    Red,
    /// Below 50%.
    Orange,
    /// Below 75%.
    Yellow,
    /// 75% and above.
    Green,
}

impl Band {
    /// Band for a percentage of range.
    #[must_use]
    pub fn for_percent(percent: f64) -> Self {
        if percent < 25.0 {
            Self::Red
        } else if percent < 50.0 {
            Self::Orange
        } else if percent < 75.0 {
            Self::Yellow
        } else {
            Self::Green
        }
    }
}

/// A persistent stat or relation display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatView {
    /// Stat key.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Current value.
    pub value: i64,
    /// Position within the key's range.
    pub percent: f64,
    /// Colour band, for relations.
    pub band: Option<Band>,
    /// Inline delta currently shown beside the display.
    pub inline_delta: Option<f64>,
}

/// What the allocation screen needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupView {
    /// Points to distribute over `stat_keys`.
    pub stat_pool: i64,
    /// Player-distributed stat keys.
    pub stat_keys: Vec<String>,
    /// Points to distribute over `relation_keys`.
    pub relation_pool: i64,
    /// Player-distributed relation keys.
    pub relation_keys: Vec<String>,
}

/// Everything a presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    /// Session identifier.
    pub session_id: Uuid,
    /// Engine phase.
    pub phase: Phase,
    /// Whether playback is paused.
    pub paused: bool,
    /// Story title.
    pub story_title: String,
    /// Story blurb, on the story start screen.
    pub description: Option<String>,
    /// Title shown on chapter start and chapter transition screens.
    pub chapter_title: Option<String>,
    /// Scene being played.
    pub scene_id: Option<SceneId>,
    /// Block on screen.
    pub block: Option<BlockView>,
    /// Subtitle text, or `None`.
    pub subtitle: Option<String>,
    /// Visible choices.
    pub choices: Vec<ChoiceView>,
    /// Remaining whole seconds of the decision timer.
    pub seconds_left: Option<u64>,
    /// Notice on screen.
    pub notice: Option<Notice>,
    /// Notices waiting behind it.
    pub pending_notices: usize,
    /// Persistent stat displays.
    pub stats: Vec<StatView>,
    /// Persistent displays of active relations.
    pub relations: Vec<StatView>,
    /// Allocation screen data, during character setup.
    pub setup: Option<SetupView>,
    /// Presentation theme tag.
    pub theme: String,
    /// Player character.
    pub character: CharacterProfile,
    /// Terminal error message.
    pub error: Option<String>,
}
