//! Error kinds visible at the agent API boundary.

use crate::transport::{Payload, TransportError};

/// Failure of an agent operation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Could not establish a connection to the agent.
    #[error("connection to agent failed")]
    Connect,

    /// The request exceeded its deadline.
    #[error("agent request timed out")]
    Timeout,

    /// Other transport-level failure.
    #[error("transport failure: {0}")]
    Driver(String),

    /// The agent answered, but not with the expected status.
    #[error("agent returned HTTP {status}")]
    Http {
        status: u16,
        headers: Vec<(String, String)>,
        payload: Payload,
    },

    /// Session, check, or service absent at the agent.
    #[error("not found")]
    NotFound,

    /// A reply body could not be decoded. Fatal to the current call only.
    #[error("failed to decode agent reply: {0}")]
    Decode(String),
}

impl From<TransportError> for AgentError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connect => AgentError::Connect,
            TransportError::Timeout => AgentError::Timeout,
            TransportError::Other(message) => AgentError::Driver(message),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(error: serde_json::Error) -> Self {
        AgentError::Decode(error.to_string())
    }
}
