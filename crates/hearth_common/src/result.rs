//! Common result and error types for the Hearth planner.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Hearth), not a
/// problem with the user's build rules. Rule problems are either reported
/// through a diagnostic sink or returned as a crate-specific error enum.
pub type HearthResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Hearth, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal planner error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
