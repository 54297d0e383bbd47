//! Cinestory — story graph model and authored-content ingestion.
//!
//! Responsible for the read-only `StoryGraph` the playback engine walks,
//! parsing the authored JSON/YAML shape into it (normalising legacy field
//! shapes at the boundary), content hashing, and the source port the engine
//! loads graphs through.

pub mod application;
pub mod domain;
