//! Shared test doubles and story fixtures for the Cinestory engine.

mod clock;
mod media;
mod rng;
mod source;
mod story;

pub use clock::{FixedClock, fixed_clock};
pub use media::RecordingMediaOutput;
pub use rng::{MockRng, SequenceRng};
pub use source::{FailingStorySource, StaticStorySource};
pub use story::{BlockBuilder, ChoiceBuilder, SceneBuilder, StoryBuilder};
