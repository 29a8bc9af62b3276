//! Error types for the request protocol server

use thiserror::Error;

/// Request protocol errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Command before authentication")]
    NotAuthenticated,

    #[error("Scheduler unavailable: {0}")]
    Scheduler(#[from] ferry_execution::ExecutionError),

    #[error("Connection closed")]
    ConnectionClosed,
}

pub type ServerResult<T> = Result<T, ServerError>;
