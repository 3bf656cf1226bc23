//! Error types for the vigil agent

use thiserror::Error;

use crate::protocol::CommandKind;

/// Main error type for the vigil agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("sequence mismatch: sent {sent}, reply carries {received}")]
    SeqMismatch { sent: u64, received: u64 },

    #[error("result count mismatch: {commands} commands, {results} results")]
    ResultCountMismatch { commands: usize, results: usize },

    #[error("result {index} does not answer a {expected:?} command")]
    KindMismatch { index: usize, expected: CommandKind },

    #[error("datagram of {size} bytes exceeds the {cap} byte cap")]
    OversizedDatagram { size: usize, cap: usize },

    #[error("no response from {0}")]
    NoResponse(std::net::SocketAddr),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("worker pool error: {0}")]
    PoolError(String),

    #[error("scan error: {0}")]
    ScanError(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::ConfigError(err.to_string())
    }
}
