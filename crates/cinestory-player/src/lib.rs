//! Cinestory console runner.
//!
//! Plays a story file headlessly: intents come in as stdin lines, render
//! snapshots go out as JSON lines on stdout.

pub mod config;
pub mod console;
pub mod error;
pub mod media;
