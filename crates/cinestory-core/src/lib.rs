//! Cinestory Core — shared abstractions for the narrative playback engine.
//!
//! This crate defines the ports and vocabulary every other crate depends on:
//! time, randomness, media output, player intents, session events and the
//! error taxonomy. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod ids;
pub mod media;
pub mod rng;
