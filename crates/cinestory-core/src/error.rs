//! Domain error types.

use thiserror::Error;

use crate::ids::SceneId;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The story graph cannot be played at all (no starting scene, or the
    /// graph could not be fetched). Fatal for the session.
    #[error("story graph integrity error: {0}")]
    GraphIntegrity(String),

    /// A resolved navigation target does not exist in the graph.
    #[error("navigation target {0} does not exist")]
    MissingTarget(SceneId),

    /// The decision timer expired with no requirement-satisfying choice.
    #[error("no eligible choice in {0} when the decision timer expired")]
    NoEligibleChoice(SceneId),

    /// An intent was rejected because it is invalid in the current state.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure error (story source I/O or parsing).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Whether this error ends the session in its terminal error state.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::GraphIntegrity(_))
    }
}
