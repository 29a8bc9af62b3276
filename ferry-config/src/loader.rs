//! Configuration loading and environment variable handling

use std::path::Path;
use std::time::Duration;

use crate::domains::FerryConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the default `FERRY` prefix
    pub fn new() -> Self {
        Self {
            prefix: "FERRY".to_string(),
        }
    }

    /// Create a new config loader with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<FerryConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: FerryConfig = serde_yaml::from_str(&content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<FerryConfig> {
        let mut config = FerryConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<FerryConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut FerryConfig) -> ConfigResult<()> {
        if let Ok(v) = self.get_env_var("MAX_NUM_JOBS") {
            config.scheduler.max_num_jobs = v
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid MAX_NUM_JOBS: {}", e)))?;
        }
        if let Ok(v) = self.get_env_var("MAX_RETRY") {
            config.scheduler.max_retry = v
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid MAX_RETRY: {}", e)))?;
        }
        if let Ok(v) = self.get_env_var("MAX_DELAY_MINUTES") {
            let minutes: u64 = v.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MAX_DELAY_MINUTES: {}", e))
            })?;
            config.scheduler.max_delay = Duration::from_secs(minutes * 60);
        }
        if let Ok(v) = self.get_env_var("MODULE_DIR") {
            config.paths.module_dir = v.into();
        }
        if let Ok(v) = self.get_env_var("LOG_DIR") {
            config.paths.log_dir = v.into();
        }
        if let Ok(v) = self.get_env_var("CRED_TMP_DIR") {
            config.paths.cred_tmp_dir = v.into();
        }
        if let Ok(v) = self.get_env_var("QUEUE_FILE") {
            config.paths.queue_file = v.into();
        }
        if let Ok(v) = self.get_env_var("BIND_ADDR") {
            config.server.bind_addr = v;
        }
        if let Ok(v) = self.get_env_var("LOG_LEVEL") {
            use std::str::FromStr;
            config.logging.level = crate::domains::logging::LogLevel::from_str(&v)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", v)))?;
        }
        Ok(())
    }

    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
