//! Player intent abstractions.

use uuid::Uuid;

/// Trait that all player intents delivered to a session implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this intent (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this intent through the events it causes.
    fn correlation_id(&self) -> Uuid;
}
