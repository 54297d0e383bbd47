//! Domain layer for the playback engine.

pub mod choice_resolver;
pub mod commands;
pub mod config;
pub mod decision_timer;
pub mod engine;
pub mod events;
pub mod notifications;
pub mod player_state;
pub mod session;
pub mod snapshot;
pub mod timeline;
