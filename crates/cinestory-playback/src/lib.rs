//! Cinestory — narrative playback engine.
//!
//! Walks an authored story graph for one player session: sequences timed
//! content blocks, evaluates stat-gated visibility and branching, applies
//! choice effects, and drives relation and notification state with
//! pause/resume and timeout-driven auto-resolution.

pub mod application;
pub mod domain;
