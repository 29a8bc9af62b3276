//! Filesystem layout: module catalog, queue log, scratch and credential dirs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Filesystem paths used by the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the protocol modules (transfer.*, reserve.*, ...).
    /// Must exist; checked fatally at startup.
    pub module_dir: PathBuf,

    /// Working directory for modules; also receives the per-pid
    /// diagnostic capture files (`out.{pid}`)
    pub log_dir: PathBuf,

    /// Temporary storage for per-job credential files
    pub cred_tmp_dir: PathBuf,

    /// Write-ahead log of the live job queue
    pub queue_file: PathBuf,

    /// Append-only history of terminal outcomes; defaults to the queue
    /// file path with `.history` appended
    pub history_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("/usr/libexec/ferry"),
            log_dir: PathBuf::from("/tmp"),
            cred_tmp_dir: PathBuf::from("/tmp"),
            queue_file: PathBuf::from("ferry_queue"),
            history_file: None,
        }
    }
}

impl PathsConfig {
    /// Effective history file path.
    pub fn history_file(&self) -> PathBuf {
        match &self.history_file {
            Some(path) => path.clone(),
            None => {
                let mut name = self.queue_file.as_os_str().to_os_string();
                name.push(".history");
                PathBuf::from(name)
            }
        }
    }

    /// Per-job credential file path, named deterministically from the id.
    pub fn credential_file(&self, job_id: u64) -> PathBuf {
        self.cred_tmp_dir.join(format!("cred-{}", job_id))
    }

    /// Per-pid one-line diagnostic capture file written by modules.
    pub fn capture_file(&self, pid: u32) -> PathBuf {
        self.log_dir.join(format!("out.{}", pid))
    }
}

impl Validatable for PathsConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (field, path) in [
            ("module_dir", &self.module_dir),
            ("log_dir", &self.log_dir),
            ("cred_tmp_dir", &self.cred_tmp_dir),
            ("queue_file", &self.queue_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error(format!("{} cannot be empty", field)));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "paths"
    }
}

/// Startup-time check that the module directory exists and is a directory.
/// Unlike `validate`, this touches the filesystem and is fatal.
pub fn check_module_dir(path: &Path) -> ConfigResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| crate::error::ConfigError::DomainError {
        domain: "paths".to_string(),
        message: format!("invalid module_dir {}: {}", path.display(), e),
    })?;
    if !meta.is_dir() {
        return Err(crate::error::ConfigError::DomainError {
            domain: "paths".to_string(),
            message: format!("module_dir {} is not a directory", path.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_defaults_to_queue_file_suffix() {
        let cfg = PathsConfig {
            queue_file: PathBuf::from("/var/lib/ferry/queue"),
            ..Default::default()
        };
        assert_eq!(
            cfg.history_file(),
            PathBuf::from("/var/lib/ferry/queue.history")
        );
    }

    #[test]
    fn explicit_history_path_wins() {
        let cfg = PathsConfig {
            history_file: Some(PathBuf::from("/tmp/h")),
            ..Default::default()
        };
        assert_eq!(cfg.history_file(), PathBuf::from("/tmp/h"));
    }

    #[test]
    fn credential_and_capture_paths() {
        let cfg = PathsConfig {
            cred_tmp_dir: PathBuf::from("/tmp/creds"),
            log_dir: PathBuf::from("/var/log/ferry"),
            ..Default::default()
        };
        assert_eq!(cfg.credential_file(42), PathBuf::from("/tmp/creds/cred-42"));
        assert_eq!(cfg.capture_file(999), PathBuf::from("/var/log/ferry/out.999"));
    }

    #[test]
    fn module_dir_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_module_dir(dir.path()).is_ok());
        assert!(check_module_dir(&dir.path().join("missing")).is_err());
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(check_module_dir(&file).is_err());
    }
}
