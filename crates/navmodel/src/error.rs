//! Error types for navigation model evaluation

use crate::bus::BusError;
use crate::runner::RunnerError;
use crate::state::Phase;

/// Errors surfaced by the evaluation lifecycle
#[derive(thiserror::Error, Debug)]
pub enum NavModelError {
    /// Malformed buffer sizes or layout mismatch; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The runner faulted during eval_frame; the output buffer is undefined
    #[error("Inference failure: {0}")]
    InferenceFailure(#[source] RunnerError),

    /// Operation called in a phase that does not allow it
    #[error("Precondition violation: {operation} not allowed in phase {phase:?}")]
    PreconditionViolation { operation: &'static str, phase: Phase },

    /// Message bus rejected a publish
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl NavModelError {
    /// Whether a caller can recover by skipping the frame or re-initialising
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NavModelError::InferenceFailure(_))
    }
}

/// Result type for navigation model operations
pub type Result<T, E = NavModelError> = std::result::Result<T, E>;
