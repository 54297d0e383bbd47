//! Clock abstractions for determinism.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstraction over system time, used to timestamp session events.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Millisecond position on one of the session timelines.
pub type Millis = u64;

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn to_millis(duration: Duration) -> Millis {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Longest authored duration honoured, in milliseconds (one day).
pub const MAX_AUTHORED_MILLIS: Millis = 24 * 60 * 60 * 1000;

/// Converts authored seconds (possibly fractional) to milliseconds.
///
/// Negative and non-finite inputs collapse to zero; anything longer than
/// [`MAX_AUTHORED_MILLIS`] is capped there.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn seconds_to_millis(seconds: f64) -> Millis {
    if seconds.is_finite() && seconds > 0.0 {
        let millis = (seconds * 1000.0).round();
        if millis >= MAX_AUTHORED_MILLIS as f64 {
            MAX_AUTHORED_MILLIS
        } else {
            millis as Millis
        }
    } else {
        0
    }
}

/// Virtual session time with two timelines.
///
/// The wall timeline always advances. The play timeline advances only while
/// playback is not paused, so anything scheduled against it is suspended and
/// resumed with its remaining duration intact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackClock {
    wall: Millis,
    play: Millis,
    paused: bool,
}

impl PlaybackClock {
    /// Creates a clock at the origin of both timelines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wall position.
    #[must_use]
    pub fn wall(&self) -> Millis {
        self.wall
    }

    /// Current play position.
    #[must_use]
    pub fn play(&self) -> Millis {
        self.play
    }

    /// Whether the play timeline is frozen.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freezes or unfreezes the play timeline.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Moves the wall timeline forward to `wall`, carrying the play timeline
    /// along unless paused. Positions in the past are ignored.
    pub fn advance_to(&mut self, wall: Millis) {
        if wall <= self.wall {
            return;
        }
        let delta = wall - self.wall;
        self.wall = wall;
        if !self.paused {
            self.play = self.play.saturating_add(delta);
        }
    }

    /// Maps a play-timeline position to the wall position at which it will be
    /// reached, or `None` while paused.
    #[must_use]
    pub fn wall_for_play(&self, play: Millis) -> Option<Millis> {
        if self.paused {
            None
        } else {
            Some(self.wall.saturating_add(play.saturating_sub(self.play)))
        }
    }
}
