//! Configuration management for ferryd
//!
//! Layered loading: YAML file, then `FERRY_*` environment overrides,
//! then per-domain validation.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::logging::{LogFormat, LogLevel, LoggingConfig};
pub use domains::paths::{check_module_dir, PathsConfig};
pub use domains::scheduler::SchedulerConfig;
pub use domains::server::{AuthToken, ServerConfig};
pub use domains::FerryConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;
