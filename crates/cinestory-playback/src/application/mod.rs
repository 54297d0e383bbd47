//! Application layer: session start-up, intent handling, read views and the
//! async session runtime.

pub mod command_handlers;
pub mod query_handlers;
pub mod runtime;
