//! Domain-specific configuration modules

pub mod logging;
pub mod paths;
pub mod scheduler;
pub mod server;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Main ferryd configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FerryConfig {
    /// Scheduling limits and monitor periods
    pub scheduler: scheduler::SchedulerConfig,

    /// Filesystem layout
    pub paths: paths::PathsConfig,

    /// Request protocol server
    pub server: server::ServerConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl FerryConfig {
    /// Validate every domain.
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.scheduler.validate()?;
        self.paths.validate()?;
        self.server.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
