//! Daemon-level errors.

use std::fmt;

/// Result alias for daemon startup and shutdown paths.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort the announcer daemon.
///
/// Per-tick agent failures never reach this type: announce units absorb
/// them and retry on their own. What remains is the small set of fatal
/// conditions around startup and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP transport could not be brought up; without it the daemon
    /// cannot reach the agent at all.
    #[error("transport unavailable: {0}")]
    Transport(String),

    /// A structural announce failure (not a per-tick one).
    #[error("announce failed: {0}")]
    Announce(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn transport(msg: impl fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    pub fn announce(msg: impl fmt::Display) -> Self {
        Error::Announce(msg.to_string())
    }
}
