//! Error taxonomy of the triage engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriageError {
    /// Missing or empty message. Nothing was appended.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected failure inside the engine or its collaborators. The message
    /// is for logs only; callers surface a generic error.
    #[error("internal failure: {0}")]
    InternalFailure(String),

    /// The pending reply was cancelled before it was appended.
    #[error("reply was cancelled")]
    Cancelled,
}

impl TriageError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFailure(message.into())
    }

    /// Whether the caller caused the error (4xx) rather than the engine (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
