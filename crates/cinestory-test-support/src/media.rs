//! Recording media output for asserting channel side-effects.

use std::sync::{Arc, Mutex, PoisonError};

use cinestory_core::media::{AudioChannel, MediaCommand, MediaOutput};

/// A media output that records every command it receives.
///
/// Clones share the same log, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingMediaOutput {
    commands: Arc<Mutex<Vec<MediaCommand>>>,
}

impl RecordingMediaOutput {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded commands.
    #[must_use]
    pub fn commands(&self) -> Vec<MediaCommand> {
        self.lock().clone()
    }

    /// Returns and clears all recorded commands.
    #[must_use]
    pub fn take(&self) -> Vec<MediaCommand> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns the recorded commands addressed to `channel`.
    #[must_use]
    pub fn commands_for(&self, channel: AudioChannel) -> Vec<MediaCommand> {
        self.lock()
            .iter()
            .filter(|command| command_channel(command) == channel)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MediaCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn command_channel(command: &MediaCommand) -> AudioChannel {
    match command {
        MediaCommand::Play { channel, .. }
        | MediaCommand::Stop { channel }
        | MediaCommand::Pause { channel }
        | MediaCommand::Resume { channel } => *channel,
    }
}

impl MediaOutput for RecordingMediaOutput {
    fn play_channel(&mut self, channel: AudioChannel, media_ref: &str, looped: bool) {
        self.lock().push(MediaCommand::Play {
            channel,
            media_ref: media_ref.to_owned(),
            looped,
        });
    }

    fn stop_channel(&mut self, channel: AudioChannel) {
        self.lock().push(MediaCommand::Stop { channel });
    }

    fn pause_channel(&mut self, channel: AudioChannel) {
        self.lock().push(MediaCommand::Pause { channel });
    }

    fn resume_channel(&mut self, channel: AudioChannel) {
        self.lock().push(MediaCommand::Resume { channel });
    }
}
