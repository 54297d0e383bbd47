//! A media output that logs channel commands instead of playing them.

use cinestory_core::media::{AudioChannel, MediaOutput};
use tracing::info;

/// Writes every channel command to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMediaOutput;

impl MediaOutput for LoggingMediaOutput {
    fn play_channel(&mut self, channel: AudioChannel, media_ref: &str, looped: bool) {
        info!(%channel, media_ref, looped, "play");
    }

    fn stop_channel(&mut self, channel: AudioChannel) {
        info!(%channel, "stop");
    }

    fn pause_channel(&mut self, channel: AudioChannel) {
        info!(%channel, "pause");
    }

    fn resume_channel(&mut self, channel: AudioChannel) {
        info!(%channel, "resume");
    }
}
