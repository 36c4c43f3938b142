//! Error taxonomy for the calculation workflow.

use thiserror::Error;

/// Errors surfaced by the board, the recognition session and the backend client.
///
/// None of these are fatal: every variant is recovered locally and shown to the
/// user as a transient notice (see [`CalcError::notice_text`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// Calculate was requested on a surface with no ink.
    #[error("canvas is empty")]
    EmptyCanvas,
    /// A request is already in flight or results are still being presented.
    #[error("a calculation is already in progress")]
    SessionBusy,
    /// The recognition backend failed or answered with a non-2xx status.
    #[error("backend error: {message}")]
    Backend { message: String },
    /// The backend did not answer within the configured timeout.
    #[error("backend request timed out")]
    Timeout,
    /// The surface snapshot could not be encoded.
    #[error("snapshot encoding failed: {0}")]
    Encode(String),
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for calculation operations.
pub type CalcResult<T> = Result<T, CalcError>;

impl CalcError {
    /// Build a backend error from any displayable message.
    pub fn backend(message: impl Into<String>) -> Self {
        CalcError::Backend { message: message.into() }
    }

    /// The short text shown in the transient notice for this error.
    pub fn notice_text(&self) -> String {
        match self {
            CalcError::EmptyCanvas => "Canvas is empty. Please draw something first.".to_string(),
            CalcError::SessionBusy => "Already calculating. Please wait.".to_string(),
            CalcError::Backend { message } => format!("Server error: {}", message),
            CalcError::Timeout => "Server error: request timed out".to_string(),
            CalcError::Encode(msg) => format!("Could not capture drawing: {}", msg),
            CalcError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}
