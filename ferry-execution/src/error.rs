//! Error types for job dispatch and scheduling

use thiserror::Error;

use ferry_core::JobId;

/// Dispatch and scheduling errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Store error: {0}")]
    Store(#[from] ferry_store::StoreError),

    #[error("Domain error: {0}")]
    Core(#[from] ferry_core::CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ferry_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Spawn failed for job {job_id}: {reason}")]
    SpawnFailed { job_id: JobId, reason: String },

    #[error("Credential error for job {job_id}: {reason}")]
    Credential { job_id: JobId, reason: String },

    #[error("Lease service error: {0}")]
    LeaseService(String),

    #[error("Scheduler is shutting down")]
    Shutdown,
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
