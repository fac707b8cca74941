//! Core domain errors.

use thiserror::Error;

/// Core domain errors for gridrender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Iterations are numbered from 1.
    #[error("Invalid iteration: {0} (iterations start at 1)")]
    InvalidIteration(u32),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}
