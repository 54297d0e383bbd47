//! Story graph domain model.

pub mod conditions;
pub mod graph;
pub(crate) mod raw;
