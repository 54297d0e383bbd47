//! Session events recorded by the playback engine.

use cinestory_content::domain::graph::MediaType;
use cinestory_core::event::{DomainEvent, EventMetadata};
use cinestory_core::ids::{ChapterId, SceneId};
use serde::{Deserialize, Serialize};

use super::engine::Phase;

/// Emitted once the story graph has been accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLoaded {
    /// Story title.
    pub title: String,
    /// Content hash of the authored source.
    pub version_hash: String,
    /// Number of scenes in the graph.
    pub scene_count: usize,
}

/// Emitted whenever the engine moves to a different phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseChanged {
    /// Phase left.
    pub from: Phase,
    /// Phase entered.
    pub to: Phase,
}

/// Emitted when a scene flow starts playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneStarted {
    /// The scene.
    pub scene_id: SceneId,
    /// Its chapter.
    pub chapter_id: Option<ChapterId>,
    /// Blocks left after condition filtering.
    pub block_count: usize,
}

/// Emitted when a choice's result timeline starts playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStarted {
    /// Scene the choice belongs to.
    pub scene_id: SceneId,
    /// Scene navigated to after the result timeline.
    pub target: Option<SceneId>,
    /// Blocks left after condition filtering.
    pub block_count: usize,
}

/// Emitted when a content block becomes current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntered {
    /// Media cue of the block.
    pub cue: u64,
    /// Position in the active list.
    pub index: usize,
    /// Image or video.
    pub media_type: MediaType,
    /// Asset reference.
    pub media_ref: Option<String>,
}

/// Emitted when the subtitle region changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleChanged {
    /// New text, or `None` when cleared.
    pub text: Option<String>,
}

/// Emitted when a relation is engaged or released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationToggled {
    /// Relation key.
    pub key: String,
}

/// Emitted when the choice menu appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoicesPresented {
    /// The scene.
    pub scene_id: SceneId,
    /// Indices of the choices whose requirements hold.
    pub available: Vec<usize>,
    /// Decision timeout, zero when unlimited.
    pub timeout_seconds: u32,
}

/// Emitted when a choice is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceCommitted {
    /// The scene.
    pub scene_id: SceneId,
    /// Index of the choice within the scene.
    pub choice_index: usize,
    /// Whether the decision timer picked it.
    pub auto: bool,
}

/// Emitted per effect applied to player state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectApplied {
    /// Stat key.
    pub key: String,
    /// Authored delta.
    pub delta: i64,
    /// Value before.
    pub before: i64,
    /// Value after clamping.
    pub after: i64,
}

/// Emitted once a committed choice's target is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResolved {
    /// Navigation target, if any.
    pub target: Option<SceneId>,
    /// Index of the dynamic route that overrode the default target.
    pub route_index: Option<usize>,
}

/// Emitted per notice queued for the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeRaised {
    /// Notice text.
    pub text: String,
}

/// Emitted when playback is paused or resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseToggled {
    /// New paused flag.
    pub paused: bool,
}

/// Emitted when the story ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEnded {
    /// Scene the story ended in.
    pub scene_id: Option<SceneId>,
}

/// Event payload variants of a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEventKind {
    /// The graph was accepted.
    SessionLoaded(SessionLoaded),
    /// The engine changed phase.
    PhaseChanged(PhaseChanged),
    /// A scene flow started.
    SceneStarted(SceneStarted),
    /// A result flow started.
    ResultStarted(ResultStarted),
    /// A block became current.
    BlockEntered(BlockEntered),
    /// The subtitle region changed.
    SubtitleChanged(SubtitleChanged),
    /// A relation was engaged.
    RelationStarted(RelationToggled),
    /// A relation was released.
    RelationStopped(RelationToggled),
    /// The choice menu appeared.
    ChoicesPresented(ChoicesPresented),
    /// A choice was committed.
    ChoiceCommitted(ChoiceCommitted),
    /// An effect changed player state.
    EffectApplied(EffectApplied),
    /// A navigation target was resolved.
    RouteResolved(RouteResolved),
    /// A notice was queued.
    NoticeRaised(NoticeRaised),
    /// Playback was paused or resumed.
    PauseToggled(PauseToggled),
    /// The story ended.
    GameEnded(GameEnded),
}

/// Session event envelope.
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: PlaybackEventKind,
}

impl PlaybackEventKind {
    /// Routing name of the payload.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionLoaded(_) => "playback.session_loaded",
            Self::PhaseChanged(_) => "playback.phase_changed",
            Self::SceneStarted(_) => "playback.scene_started",
            Self::ResultStarted(_) => "playback.result_started",
            Self::BlockEntered(_) => "playback.block_entered",
            Self::SubtitleChanged(_) => "playback.subtitle_changed",
            Self::RelationStarted(_) => "playback.relation_started",
            Self::RelationStopped(_) => "playback.relation_stopped",
            Self::ChoicesPresented(_) => "playback.choices_presented",
            Self::ChoiceCommitted(_) => "playback.choice_committed",
            Self::EffectApplied(_) => "playback.effect_applied",
            Self::RouteResolved(_) => "playback.route_resolved",
            Self::NoticeRaised(_) => "playback.notice_raised",
            Self::PauseToggled(_) => "playback.pause_toggled",
            Self::GameEnded(_) => "playback.game_ended",
        }
    }
}

impl DomainEvent for PlaybackEvent {
    fn event_type(&self) -> &'static str {
        self.kind.type_name()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("PlaybackEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
