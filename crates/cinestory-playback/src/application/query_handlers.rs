//! Query handlers for playback sessions.
//!
//! Read-only views over a running engine, for status endpoints and logs.

use std::collections::{BTreeMap, BTreeSet};

use cinestory_core::ids::SceneId;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::engine::{NarrativeEngine, Phase};
use crate::domain::snapshot::RenderSnapshot;

/// Read-only summary of a playback session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// The session identifier.
    pub session_id: Uuid,
    /// Story title.
    pub story_title: String,
    /// Content hash of the loaded story.
    pub version_hash: String,
    /// Engine phase.
    pub phase: Phase,
    /// Scene on screen, if any.
    pub scene_id: Option<SceneId>,
    /// Whether playback is paused.
    pub paused: bool,
    /// Current cancellation epoch.
    pub epoch: u64,
    /// Every stat and relation value, hidden ones included.
    pub values: BTreeMap<String, i64>,
    /// Engaged relations.
    pub active_relations: BTreeSet<String>,
}

/// Summarises the session state behind an engine.
#[must_use]
pub fn get_session_view(engine: &NarrativeEngine) -> SessionView {
    let graph = engine.graph();
    let state = engine.player_state();
    SessionView {
        session_id: engine.session_id(),
        story_title: graph.title.clone(),
        version_hash: graph.version_hash.clone(),
        phase: engine.phase(),
        scene_id: engine.snapshot().scene_id,
        paused: engine.is_paused(),
        epoch: engine.epoch(),
        values: state.values().clone(),
        active_relations: state.active_relations().clone(),
    }
}

/// The current render state.
#[must_use]
pub fn get_render_snapshot(engine: &NarrativeEngine) -> RenderSnapshot {
    engine.snapshot()
}
