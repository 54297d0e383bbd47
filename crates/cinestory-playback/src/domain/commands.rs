//! Player intents delivered to a playback session.

use std::collections::BTreeMap;

use cinestory_core::command::Command;
use uuid::Uuid;

/// Commit a choice of the current scene.
#[derive(Debug, Clone)]
pub struct SelectChoice {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Index of the choice within the scene's authored choice list.
    pub choice_index: usize,
}

/// Pause or resume playback.
#[derive(Debug, Clone)]
pub struct TogglePause {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

/// Advance past the story start, chapter start or chapter transition screen.
#[derive(Debug, Clone)]
pub struct Continue {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

/// Finish the character allocation phase.
#[derive(Debug, Clone)]
pub struct CompleteCharacterSetup {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Points added per stat or relation key.
    pub allocation: BTreeMap<String, i64>,
}

/// The media output finished playing the video of a block.
#[derive(Debug, Clone)]
pub struct MediaEnded {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Cue of the block the signal refers to.
    pub cue: u64,
}

impl Command for SelectChoice {
    fn command_type(&self) -> &'static str {
        "playback.select_choice"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for TogglePause {
    fn command_type(&self) -> &'static str {
        "playback.toggle_pause"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for Continue {
    fn command_type(&self) -> &'static str {
        "playback.continue"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for CompleteCharacterSetup {
    fn command_type(&self) -> &'static str {
        "playback.complete_character_setup"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for MediaEnded {
    fn command_type(&self) -> &'static str {
        "playback.media_ended"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Any intent a session accepts.
#[derive(Debug, Clone)]
pub enum PlayerIntent {
    /// See [`SelectChoice`].
    SelectChoice(SelectChoice),
    /// See [`TogglePause`].
    TogglePause(TogglePause),
    /// See [`Continue`].
    Continue(Continue),
    /// See [`CompleteCharacterSetup`].
    CompleteCharacterSetup(CompleteCharacterSetup),
    /// See [`MediaEnded`].
    MediaEnded(MediaEnded),
}

impl PlayerIntent {
    /// The wrapped intent as a `Command`.
    #[must_use]
    pub fn as_command(&self) -> &dyn Command {
        match self {
            Self::SelectChoice(c) => c,
            Self::TogglePause(c) => c,
            Self::Continue(c) => c,
            Self::CompleteCharacterSetup(c) => c,
            Self::MediaEnded(c) => c,
        }
    }

    /// Selects the choice at `choice_index` with a fresh correlation id.
    #[must_use]
    pub fn select(choice_index: usize) -> Self {
        Self::SelectChoice(SelectChoice {
            correlation_id: Uuid::new_v4(),
            choice_index,
        })
    }

    /// Toggles pause with a fresh correlation id.
    #[must_use]
    pub fn toggle_pause() -> Self {
        Self::TogglePause(TogglePause {
            correlation_id: Uuid::new_v4(),
        })
    }

    /// Continues with a fresh correlation id.
    #[must_use]
    pub fn proceed() -> Self {
        Self::Continue(Continue {
            correlation_id: Uuid::new_v4(),
        })
    }

    /// Completes character setup with a fresh correlation id.
    #[must_use]
    pub fn complete_setup(allocation: BTreeMap<String, i64>) -> Self {
        Self::CompleteCharacterSetup(CompleteCharacterSetup {
            correlation_id: Uuid::new_v4(),
            allocation,
        })
    }

    /// Reports the end of the video with `cue`, with a fresh correlation id.
    #[must_use]
    pub fn media_ended(cue: u64) -> Self {
        Self::MediaEnded(MediaEnded {
            correlation_id: Uuid::new_v4(),
            cue,
        })
    }
}
