//! Error taxonomy shared by generators, sinks and the coordinator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Out-of-domain parameter: initial state, burn-in, sweep step, tempo.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required external resource (MIDI output port) is missing.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A map iteration left the finite range of f64.
    #[error("trajectory diverged at iteration {iteration}")]
    NumericDivergence { iteration: usize },

    #[error("MIDI output error: {0}")]
    Midi(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
