//! Audio/video output port.
//!
//! The engine never touches a device. It issues channel commands to a
//! `MediaOutput` collaborator owned by the session context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three independent audio channels of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioChannel {
    /// Looping background bed, restarted at every block entry.
    Background,
    /// Looping emotion layer, restarted at every block entry.
    Emotion,
    /// One-shot narration that may span several blocks.
    Voiceover,
}

impl AudioChannel {
    /// All channels, in a stable order.
    pub const ALL: [Self; 3] = [Self::Background, Self::Emotion, Self::Voiceover];
}

impl fmt::Display for AudioChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Background => "background",
            Self::Emotion => "emotion",
            Self::Voiceover => "voiceover",
        };
        f.write_str(name)
    }
}

/// A side-effect command issued to the media output, in recorded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MediaCommand {
    /// Start `media_ref` on `channel`, optionally looping.
    Play {
        /// Target channel.
        channel: AudioChannel,
        /// Asset reference.
        media_ref: String,
        /// Whether playback loops for the block's lifetime.
        looped: bool,
    },
    /// Stop whatever is playing on `channel`.
    Stop {
        /// Target channel.
        channel: AudioChannel,
    },
    /// Pause `channel`, keeping its position.
    Pause {
        /// Target channel.
        channel: AudioChannel,
    },
    /// Resume a paused `channel`.
    Resume {
        /// Target channel.
        channel: AudioChannel,
    },
}

/// Audio/video output collaborator.
pub trait MediaOutput: Send {
    /// Starts `media_ref` on `channel`.
    fn play_channel(&mut self, channel: AudioChannel, media_ref: &str, looped: bool);

    /// Stops `channel`.
    fn stop_channel(&mut self, channel: AudioChannel);

    /// Pauses `channel` without discarding its position.
    fn pause_channel(&mut self, channel: AudioChannel);

    /// Resumes a paused `channel`.
    fn resume_channel(&mut self, channel: AudioChannel);
}
