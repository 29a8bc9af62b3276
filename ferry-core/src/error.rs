//! Error types for the domain layer

use thiserror::Error;

use crate::job::JobId;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Job {0} has no alternate protocol pair at index {1}")]
    ProtocolIndexOutOfRange(JobId, u32),

    #[error("Job {0} is missing required field '{1}'")]
    MissingField(JobId, &'static str),
}
