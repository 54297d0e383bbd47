//! Command handlers for playback sessions.
//!
//! These functions orchestrate the engine around its collaborators: fetch
//! the story graph, apply an intent, hand back the events it produced.

use cinestory_content::application::source::StoryGraphSource;
use cinestory_core::error::DomainError;
use tracing::info;
use uuid::Uuid;

use crate::domain::commands::PlayerIntent;
use crate::domain::config::PlaybackConfig;
use crate::domain::engine::NarrativeEngine;
use crate::domain::events::PlaybackEvent;
use crate::domain::session::SessionPorts;

/// Starts a session: fetches the story once and hands it to a new engine.
///
/// Fetch failures do not surface as errors here; the engine records them and
/// sits in its terminal error phase, where the presentation layer shows them.
pub async fn start_session(
    story_id: &str,
    source: &dyn StoryGraphSource,
    config: PlaybackConfig,
    ports: SessionPorts,
) -> NarrativeEngine {
    let session_id = Uuid::new_v4();
    info!(%session_id, story_id, "starting playback session");
    let mut engine = NarrativeEngine::new(session_id, config, ports);
    let loaded = source.load_story(story_id).await;
    engine.load(loaded);
    engine
}

/// Applies one intent and returns the events recorded since the last drain.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the engine rejects the intent. The
/// events stay buffered in that case.
pub fn handle_player_intent(
    engine: &mut NarrativeEngine,
    intent: PlayerIntent,
) -> Result<Vec<PlaybackEvent>, DomainError> {
    engine.handle(intent)?;
    Ok(engine.drain_events())
}
