//! Media plane errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MpfError {
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("No codec intersection: {0}")]
    NoCodecMatch(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Engine is not running")]
    EngineStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MpfError {
    fn from(err: std::io::Error) -> Self {
        MpfError::Socket(err.to_string())
    }
}
