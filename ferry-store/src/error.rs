//! Error types for the persistence layer

use thiserror::Error;

use ferry_core::JobId;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt log entry: {0}")]
    CorruptEntry(#[from] serde_json::Error),

    #[error("Job {0} not found")]
    JobNotFound(JobId),
}

pub type StoreResult<T> = Result<T, StoreError>;
