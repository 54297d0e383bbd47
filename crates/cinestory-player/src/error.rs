//! Cinestory console runner — error types.

use cinestory_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the console runner.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading stdin or writing stdout failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be encoded.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The session rejected or lost an intent.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
