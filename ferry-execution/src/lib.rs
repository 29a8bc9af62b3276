//! Job scheduling and module dispatch for ferryd
//!
//! The scheduler task owns the queue, dispatches protocol modules up to
//! the concurrency cap and reaps their exits. External collaborators
//! (lease pool, credential store) are trait objects injected at startup.

pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod table;

pub use credentials::CredentialManager;
pub use dispatch::{DispatchPlan, ModuleDispatcher};
pub use error::{ExecutionError, ExecutionResult};
pub use scheduler::{
    ModuleExit, Scheduler, SchedulerCommand, SchedulerEvent, SchedulerHandle, StatusReport,
};
pub use services::{
    CredentialService, LeaseService, LeasedDestination, NoopCredentialService, NoopLeaseService,
};
pub use table::{RunningJob, RunningJobTable};
