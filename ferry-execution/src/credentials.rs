//! Per-job credential files
//!
//! Credentials reach modules through a file path in the environment.
//! Delegated credentials are fetched fresh at every dispatch and written
//! to a deterministic per-job path; inline credentials are written once
//! at submit time and kept until the job leaves the queue.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use ferry_config::PathsConfig;
use ferry_core::{JobId, JobRecord};

use crate::error::{ExecutionError, ExecutionResult};
use crate::services::CredentialService;

pub struct CredentialManager {
    paths: PathsConfig,
    service: Arc<dyn CredentialService>,
}

impl CredentialManager {
    pub fn new(paths: PathsConfig, service: Arc<dyn CredentialService>) -> Self {
        Self { paths, service }
    }

    /// Write a credential submitted inline with the job, returning its path.
    pub fn store_inline(&self, job_id: JobId, data: &[u8]) -> ExecutionResult<PathBuf> {
        let path = self.paths.credential_file(job_id);
        write_credential(&path, data).map_err(|e| ExecutionError::Credential {
            job_id,
            reason: format!("writing {}: {}", path.display(), e),
        })?;
        debug!(job_id, path = %path.display(), "stored inline credential");
        Ok(path)
    }

    /// Resolve the credential file to hand a dispatch, if any.
    ///
    /// A named credential is re-fetched on every attempt so renewals are
    /// picked up. Fetch problems degrade to running without a credential;
    /// the module decides whether that is fatal.
    pub async fn resolve(&self, job: &JobRecord) -> Option<PathBuf> {
        if let Some(name) = &job.cred_name {
            match self.service.fetch(&job.owner, name).await {
                Ok(Some(data)) => {
                    let path = self.paths.credential_file(job.id);
                    match write_credential(&path, &data) {
                        Ok(()) => return Some(path),
                        Err(e) => {
                            warn!(job_id = job.id, cred_name = %name, error = %e,
                                "failed to write fetched credential, dispatching without");
                        }
                    }
                }
                Ok(None) => {
                    warn!(job_id = job.id, cred_name = %name,
                        "credential not found, dispatching without");
                }
                Err(e) => {
                    warn!(job_id = job.id, cred_name = %name, error = %e,
                        "credential fetch failed, dispatching without");
                }
            }
        }
        job.inline_cred_path.as_ref().map(PathBuf::from)
    }

    /// Delete the per-job credential file once the job leaves the queue.
    pub fn remove(&self, job_id: JobId) {
        let path = self.paths.credential_file(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(job_id, path = %path.display(), "removed credential file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id, path = %path.display(), error = %e,
                "failed to remove credential file"),
        }
    }
}

/// Owner read/write only, enforced before the contents land.
fn write_credential(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    Ok(())
}
