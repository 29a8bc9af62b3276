//! Module dispatch: turning a job record into a child process
//!
//! Planning is pure (record in, command line out) so the argv rules are
//! testable without spawning anything. Spawning applies the plan with the
//! job owner's identity and per-job stdio.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use ferry_config::PathsConfig;
use ferry_core::{CoreError, JobId, JobRecord, JobType, SiteUrl};

use crate::error::{ExecutionError, ExecutionResult};

/// Everything needed to exec one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub module_path: PathBuf,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin_path: Option<String>,
    pub stdout_path: Option<String>,
    pub stderr_path: Option<String>,
}

pub struct ModuleDispatcher {
    paths: PathsConfig,
}

impl ModuleDispatcher {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Build the command line for a job's current attempt. For dynamic
    /// destinations the caller must have bound `dynamic_dest_url` first.
    pub fn plan(&self, job: &JobRecord, cred_path: Option<&Path>) -> ExecutionResult<DispatchPlan> {
        let (module_name, argv) = match job.job_type {
            JobType::Transfer => self.plan_transfer(job)?,
            JobType::Reserve => plan_reserve(job)?,
            JobType::Release => plan_release(job)?,
            JobType::RequestPath => plan_requestpath(job)?,
        };

        let mut env = vec![("FERRY_JOB_ID".to_string(), job.id.to_string())];
        if let Some(path) = cred_path {
            env.push((
                "FERRY_CREDENTIAL_FILE".to_string(),
                path.to_string_lossy().into_owned(),
            ));
        }

        // A Reserve module writes its lot into the output file named in
        // argv, so stdout stays on the null device for it.
        let stdout_path = match job.job_type {
            JobType::Reserve => None,
            _ => job.output_file.clone(),
        };

        Ok(DispatchPlan {
            module_path: self.paths.module_dir.join(module_name),
            argv,
            env,
            stdin_path: job.input_file.clone(),
            stdout_path,
            stderr_path: job.error_file.clone(),
        })
    }

    fn plan_transfer(&self, job: &JobRecord) -> ExecutionResult<(String, Vec<String>)> {
        let ep = job.transfer_endpoints()?;

        let (dest_url, dest_protocol, dynamic) = if job.has_dynamic_dest() {
            let bound = job
                .dynamic_dest_url
                .as_ref()
                .ok_or(CoreError::MissingField(job.id, "dynamic_dest_url"))?;
            let parsed = SiteUrl::parse(bound)?;
            (bound.clone(), parsed.protocol, true)
        } else {
            (ep.dest_url, ep.dest_protocol, false)
        };

        let module = format!("transfer.{}-{}", ep.src_protocol, dest_protocol);
        let mut argv = vec![ep.src_url, dest_url];
        if dynamic {
            argv.push("-dynamic".to_string());
        }
        argv.extend(job.arguments.iter().cloned());
        Ok((module, argv))
    }

    /// Spawn the planned module as the job owner. Only checks that the
    /// module exists; everything else is the kernel's verdict.
    pub async fn spawn(&self, job: &JobRecord, plan: &DispatchPlan) -> ExecutionResult<Child> {
        if !plan.module_path.is_file() {
            return Err(ExecutionError::ModuleNotFound(
                plan.module_path.to_string_lossy().into_owned(),
            ));
        }

        let mut cmd = Command::new(&plan.module_path);
        cmd.args(&plan.argv)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.paths.log_dir)
            .kill_on_drop(false);

        cmd.stdin(open_stdio(plan.stdin_path.as_deref(), job.id, false)?);
        cmd.stdout(open_stdio(plan.stdout_path.as_deref(), job.id, true)?);
        cmd.stderr(open_stdio(plan.stderr_path.as_deref(), job.id, true)?);

        apply_owner_identity(&mut cmd, job)?;

        let child = cmd.spawn().map_err(|e| ExecutionError::SpawnFailed {
            job_id: job.id,
            reason: format!("{}: {}", plan.module_path.display(), e),
        })?;
        debug!(
            job_id = job.id,
            pid = child.id(),
            module = %plan.module_path.display(),
            "spawned module"
        );
        Ok(child)
    }
}

fn plan_reserve(job: &JobRecord) -> ExecutionResult<(String, Vec<String>)> {
    let dest = SiteUrl::parse(&job.dest_url)?;
    let output_file = job
        .output_file
        .as_ref()
        .ok_or(CoreError::MissingField(job.id, "output_file"))?;
    let size = job
        .reserve_size
        .ok_or(CoreError::MissingField(job.id, "reserve_size"))?;
    let duration = job
        .duration_secs
        .ok_or(CoreError::MissingField(job.id, "duration_secs"))?;

    let module = format!("reserve.{}", dest.protocol);
    let argv = vec![
        dest.host,
        output_file.clone(),
        size.to_string(),
        duration.to_string(),
    ];
    Ok((module, argv))
}

fn plan_release(job: &JobRecord) -> ExecutionResult<(String, Vec<String>)> {
    let dest = SiteUrl::parse(&job.dest_url)?;
    let lot_id = job
        .lot_id
        .as_ref()
        .ok_or(CoreError::MissingField(job.id, "lot_id"))?;

    let module = format!("release.{}", dest.protocol);
    Ok((module, vec![dest.host, lot_id.clone()]))
}

fn plan_requestpath(job: &JobRecord) -> ExecutionResult<(String, Vec<String>)> {
    let src = SiteUrl::parse(&job.src_url)?;
    let dest = SiteUrl::parse(&job.dest_url)?;

    let module = format!("requestpath.{}", src.protocol);
    Ok((module, vec![src.host, dest.host]))
}

fn open_stdio(path: Option<&str>, job_id: JobId, write: bool) -> ExecutionResult<Stdio> {
    let Some(path) = path else {
        return Ok(Stdio::null());
    };
    let file = if write {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    } else {
        std::fs::File::open(path)
    };
    let file = file.map_err(|e| ExecutionError::SpawnFailed {
        job_id,
        reason: format!("opening {}: {}", path, e),
    })?;
    Ok(Stdio::from(file))
}

/// Run the module as the job owner when the daemon has the privilege to,
/// otherwise keep the daemon's own identity.
fn apply_owner_identity(cmd: &mut Command, job: &JobRecord) -> ExecutionResult<()> {
    if !nix::unistd::Uid::effective().is_root() {
        warn!(job_id = job.id, owner = %job.owner,
            "not running as root, module keeps daemon identity");
        return Ok(());
    }
    let user = nix::unistd::User::from_name(&job.owner)
        .map_err(|e| ExecutionError::SpawnFailed {
            job_id: job.id,
            reason: format!("looking up owner {}: {}", job.owner, e),
        })?
        .ok_or_else(|| ExecutionError::SpawnFailed {
            job_id: job.id,
            reason: format!("unknown owner {}", job.owner),
        })?;
    cmd.uid(user.uid.as_raw()).gid(user.gid.as_raw());
    Ok(())
}
