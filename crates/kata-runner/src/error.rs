//! Error types for kata-runner

use crate::types::CapturedResult;
use thiserror::Error;

/// Errors raised while talking to a runner service
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The run exceeded its time budget
    #[error("{method} timed out after {max_seconds} seconds")]
    TimedOut {
        /// Runner method that timed out
        method: String,
        /// The budget that was exceeded
        max_seconds: u64,
        /// Output captured before the time-out, when the runner reported any
        partial: Option<CapturedResult>,
    },

    /// The runner could not be reached or answered with a non-success status
    #[error("HTTP error calling {method}: {message}")]
    Http {
        /// Runner method being called
        method: String,
        /// Transport-level description
        message: String,
    },

    /// The runner raised an exception while handling the call
    #[error("runner exception in {method}: {message}")]
    Exception {
        /// Runner method being called
        method: String,
        /// Exception text returned by the runner
        message: String,
    },

    /// The runner answered with JSON that does not fit the contract
    #[error("malformed response from {method}: {message}")]
    MalformedResponse {
        /// Runner method being called
        method: String,
        /// What was wrong with the response
        message: String,
    },

    /// A lifecycle call was made out of order (unknown kata, live avatars...)
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),
}

impl RunnerError {
    /// Output the runner managed to capture before failing, if any.
    pub fn partial_output(&self) -> Option<&CapturedResult> {
        match self {
            RunnerError::TimedOut { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(err: serde_json::Error) -> Self {
        RunnerError::MalformedResponse {
            method: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}
