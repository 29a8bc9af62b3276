//! Shared harness for the end-to-end scheduler tests
//!
//! Modules are stub shell scripts installed into a temp module
//! directory; the lease and credential services are in-memory fakes.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::RwLock;

use ferry_config::{FerryConfig, PathsConfig, SchedulerConfig};
use ferry_core::{JobDescription, JobId, JobType};
use ferry_execution::{
    CredentialService, ExecutionResult, LeaseService, LeasedDestination, Scheduler,
    SchedulerHandle, StatusReport,
};

/// Lease pool fake with togglable availability and call recording
pub struct FakeLeaseService {
    available: AtomicBool,
    lease_url: Mutex<Option<String>>,
    pub returned: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<String>>,
}

impl FakeLeaseService {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(false),
            lease_url: Mutex::new(None),
            returned: Mutex::new(Vec::new()),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn offer(&self, url: &str) {
        *self.lease_url.lock().unwrap() = Some(url.to_string());
        self.available.store(true, Ordering::SeqCst);
    }

    pub fn returned_urls(&self) -> Vec<String> {
        self.returned.lock().unwrap().clone()
    }

    pub fn failed_urls(&self) -> Vec<String> {
        self.failed.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeaseService for FakeLeaseService {
    async fn are_matches_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_transfer_directory(
        &self,
        _protocol: &str,
    ) -> ExecutionResult<Option<LeasedDestination>> {
        Ok(self
            .lease_url
            .lock()
            .unwrap()
            .clone()
            .map(|url| LeasedDestination { url }))
    }

    async fn return_transfer_destination(&self, url: &str) -> ExecutionResult<()> {
        self.returned.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn fail_transfer_destination(&self, url: &str) -> ExecutionResult<()> {
        self.failed.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Credential store fake holding one named credential
pub struct FakeCredentialService {
    pub name: String,
    pub data: Vec<u8>,
}

#[async_trait]
impl CredentialService for FakeCredentialService {
    async fn fetch(&self, _owner: &str, cred_name: &str) -> ExecutionResult<Option<Vec<u8>>> {
        if cred_name == self.name {
            Ok(Some(self.data.clone()))
        } else {
            Ok(None)
        }
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub config: Arc<RwLock<FerryConfig>>,
    pub handle: SchedulerHandle,
    pub leases: Arc<FakeLeaseService>,
}

impl Harness {
    /// Start a scheduler with fast monitor periods in a temp directory.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut SchedulerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let module_dir = dir.path().join("modules");
        let log_dir = dir.path().join("log");
        std::fs::create_dir(&module_dir).unwrap();
        std::fs::create_dir(&log_dir).unwrap();

        let mut scheduler_cfg = SchedulerConfig {
            max_num_jobs: 10,
            max_retry: 10,
            max_delay: Duration::from_secs(3600),
            dispatch_interval: Duration::from_millis(50),
            hung_job_interval: Duration::from_secs(3600),
            reschedule_interval: Duration::from_millis(50),
            compaction_interval: Duration::from_secs(3600),
        };
        tweak(&mut scheduler_cfg);

        let paths = PathsConfig {
            module_dir,
            log_dir,
            cred_tmp_dir: dir.path().to_path_buf(),
            queue_file: dir.path().join("queue"),
            history_file: None,
        };
        let config = Arc::new(RwLock::new(FerryConfig {
            scheduler: scheduler_cfg,
            paths: paths.clone(),
            ..Default::default()
        }));

        let leases = Arc::new(FakeLeaseService::new());
        let (scheduler, handle) = Scheduler::new(
            Arc::clone(&config),
            paths,
            Arc::clone(&leases) as Arc<dyn LeaseService>,
            Arc::new(FakeCredentialService {
                name: "unused".to_string(),
                data: Vec::new(),
            }),
        )
        .unwrap();
        tokio::spawn(scheduler.run());

        Self {
            dir,
            config,
            handle,
            leases,
        }
    }

    pub fn module_dir(&self) -> PathBuf {
        self.dir.path().join("modules")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("log")
    }

    /// Install a stub module script under the module directory.
    pub fn install_module(&self, name: &str, script: &str) {
        install_script(&self.module_dir().join(name), script);
    }

    pub async fn submit(&self, desc: JobDescription) -> JobId {
        self.handle
            .submit(current_user(), desc, None)
            .await
            .unwrap()
    }

    /// Poll a job until its status report satisfies the predicate.
    pub async fn wait_for(
        &self,
        job_id: JobId,
        pred: impl Fn(&StatusReport) -> bool,
    ) -> StatusReport {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let report = self.handle.status(job_id).await.unwrap();
            if pred(&report) {
                return report;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting on job {}",
                job_id
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

/// Modules are dispatched under the job owner when the daemon runs as
/// root, so submissions must carry the account actually running the
/// tests.
pub fn current_user() -> String {
    nix::unistd::User::from_uid(nix::unistd::Uid::effective())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| "nobody".to_string())
}

pub fn install_script(path: &Path, script: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn transfer_desc(src: &str, dest: &str) -> JobDescription {
    JobDescription {
        job_type: JobType::Transfer,
        src_url: src.to_string(),
        dest_url: dest.to_string(),
        arguments: vec![],
        alt_protocols: vec![],
        cred_name: None,
        log_notes: None,
        input_file: None,
        output_file: None,
        error_file: None,
        reserve_id: None,
        reserve_size: None,
        duration_secs: None,
    }
}

pub fn is_completed(report: &StatusReport) -> bool {
    matches!(report, StatusReport::Historical(r) if r.status == ferry_core::JobStatus::Completed)
}

pub fn is_failed(report: &StatusReport) -> bool {
    matches!(report, StatusReport::Historical(r) if r.status == ferry_core::JobStatus::Failed)
}
