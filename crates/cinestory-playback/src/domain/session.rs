//! Explicit per-session context: virtual clock, cancellation epoch, timer
//! queue, audio channels and the event log.

use std::collections::{BTreeMap, HashMap};

use cinestory_content::domain::graph::AudioLayers;
use cinestory_core::clock::{Clock, Millis, PlaybackClock};
use cinestory_core::event::EventMetadata;
use cinestory_core::media::{AudioChannel, MediaOutput};
use cinestory_core::rng::DeterministicRng;
use uuid::Uuid;

use super::events::{PlaybackEvent, PlaybackEventKind};

/// What a scheduled timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// The current image block's duration elapsed.
    BlockElapsed,
    /// Show the subtitle at this index of the current block.
    ShowSubtitle(usize),
    /// Clear the subtitle region.
    ClearSubtitle,
    /// Apply the current block's relation starts and stops.
    RelationTriggers,
    /// One decision timer tick.
    DecisionTick,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DueTimer {
    pub epoch: u64,
    pub kind: TimerKind,
}

/// Timers ordered by play-timeline due time, then by scheduling order.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    entries: BTreeMap<(Millis, u64), DueTimer>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, due: Millis, epoch: u64, kind: TimerKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((due, seq), DueTimer { epoch, kind });
    }

    /// Removes and returns the earliest timer due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Millis) -> Option<DueTimer> {
        let (&(due, _), _) = self.entries.first_key_value()?;
        if due > now {
            return None;
        }
        self.entries.pop_first().map(|(_, timer)| timer)
    }

    pub(crate) fn next_due(&self) -> Option<Millis> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Drops every timer scheduled under an older epoch.
    pub(crate) fn purge_before(&mut self, epoch: u64) {
        self.entries.retain(|_, timer| timer.epoch >= epoch);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Owns the media output and tracks what each channel is playing.
pub(crate) struct ChannelMixer {
    output: Box<dyn MediaOutput>,
    playing: HashMap<AudioChannel, String>,
    voiceover_paused: bool,
}

impl ChannelMixer {
    pub(crate) fn new(output: Box<dyn MediaOutput>) -> Self {
        Self {
            output,
            playing: HashMap::new(),
            voiceover_paused: false,
        }
    }

    fn play(&mut self, channel: AudioChannel, media_ref: &str, looped: bool) {
        self.output.play_channel(channel, media_ref, looped);
        self.playing.insert(channel, media_ref.to_owned());
    }

    fn stop(&mut self, channel: AudioChannel) {
        self.output.stop_channel(channel);
        self.playing.remove(&channel);
    }

    /// Background and emotion restart fresh; voiceover is replaced only
    /// when the block names one.
    pub(crate) fn enter_block(&mut self, audio: &AudioLayers) {
        for (channel, layer) in [
            (AudioChannel::Background, &audio.background),
            (AudioChannel::Emotion, &audio.emotion),
        ] {
            self.stop(channel);
            if let Some(media_ref) = layer {
                self.play(channel, media_ref, true);
            }
        }
        if let Some(voiceover) = &audio.voiceover {
            self.stop(AudioChannel::Voiceover);
            self.voiceover_paused = false;
            self.play(AudioChannel::Voiceover, voiceover, false);
        }
    }

    pub(crate) fn stop_all(&mut self) {
        for channel in AudioChannel::ALL {
            self.stop(channel);
        }
        self.voiceover_paused = false;
    }

    pub(crate) fn pause_voiceover(&mut self) {
        if self.playing.contains_key(&AudioChannel::Voiceover) && !self.voiceover_paused {
            self.output.pause_channel(AudioChannel::Voiceover);
            self.voiceover_paused = true;
        }
    }

    pub(crate) fn resume_voiceover(&mut self) {
        if self.voiceover_paused {
            self.output.resume_channel(AudioChannel::Voiceover);
            self.voiceover_paused = false;
        }
    }

    pub(crate) fn playing(&self, channel: AudioChannel) -> Option<&str> {
        self.playing.get(&channel).map(String::as_str)
    }
}

impl std::fmt::Debug for ChannelMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMixer")
            .field("playing", &self.playing)
            .field("voiceover_paused", &self.voiceover_paused)
            .finish_non_exhaustive()
    }
}

/// Collaborators handed to a new session.
pub struct SessionPorts {
    /// Audio/video output.
    pub media: Box<dyn MediaOutput>,
    /// Timestamps for event metadata.
    pub clock: Box<dyn Clock>,
    /// Randomness for auto-selection.
    pub rng: Box<dyn DeterministicRng>,
}

/// Everything the engine mutates besides its own phase and player state.
pub(crate) struct SessionContext {
    pub session_id: Uuid,
    pub timeline_clock: PlaybackClock,
    pub epoch: u64,
    pub timers: TimerQueue,
    pub mixer: ChannelMixer,
    pub rng: Box<dyn DeterministicRng>,
    pub correlation_id: Uuid,
    clock: Box<dyn Clock>,
    events: Vec<PlaybackEvent>,
    sequence: i64,
}

impl SessionContext {
    pub(crate) fn new(session_id: Uuid, ports: SessionPorts) -> Self {
        Self {
            session_id,
            timeline_clock: PlaybackClock::new(),
            epoch: 0,
            timers: TimerQueue::default(),
            mixer: ChannelMixer::new(ports.media),
            rng: ports.rng,
            correlation_id: session_id,
            clock: ports.clock,
            events: Vec::new(),
            sequence: 0,
        }
    }

    /// Invalidates every timer scheduled so far.
    pub(crate) fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Schedules `kind` after `delay` of play time under the current epoch.
    pub(crate) fn schedule_in(&mut self, delay: Millis, kind: TimerKind) {
        let due = self.timeline_clock.play().saturating_add(delay);
        self.timers.schedule(due, self.epoch, kind);
    }

    /// Wall time of the next timer, `None` while paused.
    pub(crate) fn next_timer_deadline(&self) -> Option<Millis> {
        self.timers
            .next_due()
            .and_then(|due| self.timeline_clock.wall_for_play(due))
    }

    pub(crate) fn record(&mut self, kind: PlaybackEventKind) {
        self.sequence += 1;
        let event = PlaybackEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.type_name().to_owned(),
                session_id: self.session_id,
                sequence_number: self.sequence,
                correlation_id: self.correlation_id,
                epoch: self.epoch,
                occurred_at: self.clock.now(),
            },
            kind,
        };
        self.events.push(event);
    }

    pub(crate) fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("timeline_clock", &self.timeline_clock)
            .field("epoch", &self.epoch)
            .field("mixer", &self.mixer)
            .finish_non_exhaustive()
    }
}
