//! The scheduler task
//!
//! One task owns all mutable scheduling state (job store, running-job
//! table, history log) and drains a single event queue. Child processes
//! are awaited by small spawned tasks that push their exit back onto the
//! queue, so no state is ever touched concurrently. The only true
//! parallelism is the module processes themselves, bounded by
//! `max_num_jobs`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use ferry_config::FerryConfig;
use ferry_core::{
    HistoryRecord, JobDescription, JobId, JobRecord, JobStatus, JobType, JOB_ID_PLACEHOLDER,
};
use ferry_store::{HistoryLog, JobStore};

use crate::credentials::CredentialManager;
use crate::dispatch::ModuleDispatcher;
use crate::error::{ExecutionError, ExecutionResult};
use crate::services::LeaseService;
use crate::table::RunningJobTable;

/// Negative lease-availability answers are cached this long.
const DYNAMIC_RETRY_BACKOFF: Duration = Duration::from_secs(120);

/// Outcome of a reaped module process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleExit {
    pub success: bool,
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ModuleExit {
    /// Sentinel routed through the reaper when a spawn itself fails.
    pub const SERVER_ERROR: ModuleExit = ModuleExit {
        success: false,
        code: Some(111),
        signal: None,
    };

    fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit status {}", code),
            (None, Some(sig)) => format!("killed by signal {}", sig),
            (None, None) => "unknown exit".to_string(),
        }
    }
}

impl From<std::process::ExitStatus> for ModuleExit {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        Self {
            success: status.success(),
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Where a status query found its answer
#[derive(Debug, Clone)]
pub enum StatusReport {
    Live(JobRecord),
    Historical(HistoryRecord),
    NotFound,
}

/// Authenticated client commands, each carrying its reply channel
#[derive(Debug)]
pub enum SchedulerCommand {
    Submit {
        owner: String,
        description: JobDescription,
        inline_cred: Option<Vec<u8>>,
        reply: oneshot::Sender<ExecutionResult<JobId>>,
    },
    Status {
        job_id: JobId,
        reply: oneshot::Sender<StatusReport>,
    },
    List {
        owner: String,
        reply: oneshot::Sender<Vec<JobRecord>>,
    },
    Remove {
        owner: String,
        job_id: JobId,
        reply: oneshot::Sender<ExecutionResult<()>>,
    },
}

/// Everything the scheduler task reacts to
#[derive(Debug)]
pub enum SchedulerEvent {
    Command(SchedulerCommand),
    ChildExited { pid: u32, exit: ModuleExit },
    Shutdown { done: oneshot::Sender<()> },
}

/// Cloneable handle used by the server and the daemon main loop
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerEvent>,
}

impl SchedulerHandle {
    pub async fn submit(
        &self,
        owner: String,
        description: JobDescription,
        inline_cred: Option<Vec<u8>>,
    ) -> ExecutionResult<JobId> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerEvent::Command(SchedulerCommand::Submit {
            owner,
            description,
            inline_cred,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| ExecutionError::Shutdown)?
    }

    pub async fn status(&self, job_id: JobId) -> ExecutionResult<StatusReport> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerEvent::Command(SchedulerCommand::Status {
            job_id,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| ExecutionError::Shutdown)
    }

    pub async fn list(&self, owner: String) -> ExecutionResult<Vec<JobRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerEvent::Command(SchedulerCommand::List {
            owner,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| ExecutionError::Shutdown)
    }

    pub async fn remove(&self, owner: String, job_id: JobId) -> ExecutionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerEvent::Command(SchedulerCommand::Remove {
            owner,
            job_id,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| ExecutionError::Shutdown)?
    }

    /// Drain in-flight state and stop the scheduler task.
    pub async fn shutdown(&self) -> ExecutionResult<()> {
        let (done, rx) = oneshot::channel();
        self.send(SchedulerEvent::Shutdown { done }).await?;
        rx.await.map_err(|_| ExecutionError::Shutdown)
    }

    async fn send(&self, event: SchedulerEvent) -> ExecutionResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ExecutionError::Shutdown)
    }
}

pub struct Scheduler {
    config: Arc<RwLock<FerryConfig>>,
    store: JobStore,
    history: HistoryLog,
    table: RunningJobTable,
    dispatcher: ModuleDispatcher,
    credentials: CredentialManager,
    leases: Arc<dyn LeaseService>,
    events_tx: mpsc::Sender<SchedulerEvent>,
    events_rx: mpsc::Receiver<SchedulerEvent>,
    /// Negative lease-availability cache
    dynamic_blocked_until: Option<Instant>,
}

impl Scheduler {
    /// Open the stores and wire the event queue. Fails when the queue log
    /// or history file cannot be opened or replayed.
    pub fn new(
        config: Arc<RwLock<FerryConfig>>,
        paths: ferry_config::PathsConfig,
        leases: Arc<dyn LeaseService>,
        credential_service: Arc<dyn crate::services::CredentialService>,
    ) -> ExecutionResult<(Self, SchedulerHandle)> {
        let mut store = JobStore::open(&paths.queue_file)?;
        let history = HistoryLog::open(paths.history_file())?;
        store.ensure_last_id(history.max_job_id()?);

        let (events_tx, events_rx) = mpsc::channel(256);
        let handle = SchedulerHandle {
            tx: events_tx.clone(),
        };

        let scheduler = Self {
            config,
            store,
            history,
            table: RunningJobTable::new(),
            dispatcher: ModuleDispatcher::new(paths.clone()),
            credentials: CredentialManager::new(paths, credential_service),
            leases,
            events_tx,
            events_rx,
            dynamic_blocked_until: None,
        };
        Ok((scheduler, handle))
    }

    /// Run until a Shutdown event arrives.
    pub async fn run(mut self) {
        self.recover_interrupted_jobs().await;

        let cfg = self.config.read().await.scheduler.clone();
        let mut dispatch_at = Instant::now() + cfg.dispatch_interval;
        let mut reschedule_at = Instant::now() + cfg.reschedule_interval;
        let mut hung_at = Instant::now() + cfg.hung_job_interval;
        let mut compact_at = Instant::now() + cfg.compaction_interval;

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(SchedulerEvent::Command(cmd)) => self.handle_command(cmd).await,
                        Some(SchedulerEvent::ChildExited { pid, exit }) => {
                            self.handle_child_exit(pid, exit).await;
                        }
                        Some(SchedulerEvent::Shutdown { done }) => {
                            self.shutdown().await;
                            let _ = done.send(());
                            return;
                        }
                        // all senders gone, nothing left to schedule for
                        None => return,
                    }
                }
                _ = tokio::time::sleep_until(dispatch_at) => {
                    self.dispatch_sweep(JobStatus::Received).await;
                    let period = self.config.read().await.scheduler.dispatch_interval;
                    dispatch_at = Instant::now() + period;
                }
                _ = tokio::time::sleep_until(reschedule_at) => {
                    self.dispatch_sweep(JobStatus::Rescheduled).await;
                    let period = self.config.read().await.scheduler.reschedule_interval;
                    reschedule_at = Instant::now() + period;
                }
                _ = tokio::time::sleep_until(hung_at) => {
                    self.hung_job_sweep().await;
                    let period = self.config.read().await.scheduler.hung_job_interval;
                    hung_at = Instant::now() + period;
                }
                _ = tokio::time::sleep_until(compact_at) => {
                    if let Err(e) = self.store.compact() {
                        error!(error = %e, "queue log compaction failed");
                    }
                    let period = self.config.read().await.scheduler.compaction_interval;
                    compact_at = Instant::now() + period;
                }
            }
        }
    }

    /// Children of a previous daemon instance died with it. Put their
    /// jobs back in line for dispatch.
    async fn recover_interrupted_jobs(&mut self) {
        let interrupted = self.store.ids_in_status(JobStatus::Processing);
        for job_id in interrupted {
            info!(job_id, "recovering job interrupted by daemon restart");
            if let Err(e) = self.store.update(job_id, |job| {
                job.status = JobStatus::Received;
                job.dispatch_time = None;
            }) {
                error!(job_id, error = %e, "failed to recover interrupted job");
            }
        }
        self.dispatch_sweep(JobStatus::Received).await;
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Submit {
                owner,
                description,
                inline_cred,
                reply,
            } => {
                let result = self.submit_job(owner, description, inline_cred);
                let _ = reply.send(result);
                self.dispatch_sweep(JobStatus::Received).await;
            }
            SchedulerCommand::Status { job_id, reply } => {
                let _ = reply.send(self.job_status(job_id));
            }
            SchedulerCommand::List { owner, reply } => {
                let jobs = self
                    .store
                    .all_jobs()
                    .filter(|j| j.owner == owner)
                    .cloned()
                    .collect();
                let _ = reply.send(jobs);
            }
            SchedulerCommand::Remove {
                owner,
                job_id,
                reply,
            } => {
                let result = self.remove_job(&owner, job_id).await;
                let _ = reply.send(result);
            }
        }
    }

    fn submit_job(
        &mut self,
        owner: String,
        description: JobDescription,
        inline_cred: Option<Vec<u8>>,
    ) -> ExecutionResult<JobId> {
        let job_id = self.store.next_job_id();
        let mut job = JobRecord::from_description(job_id, owner, Utc::now(), description);
        if let Some(data) = inline_cred {
            let path = self.credentials.store_inline(job_id, &data)?;
            job.inline_cred_path = Some(path.to_string_lossy().into_owned());
        }
        info!(job_id, owner = %job.owner, job_type = %job.job_type, "job submitted");
        self.store.put(job)?;
        Ok(job_id)
    }

    fn job_status(&self, job_id: JobId) -> StatusReport {
        if let Some(job) = self.store.get(job_id) {
            return StatusReport::Live(job.clone());
        }
        match self.history.find(job_id) {
            Ok(Some(record)) => StatusReport::Historical(record),
            Ok(None) => StatusReport::NotFound,
            Err(e) => {
                error!(job_id, error = %e, "history lookup failed");
                StatusReport::NotFound
            }
        }
    }

    async fn remove_job(&mut self, owner: &str, job_id: JobId) -> ExecutionResult<()> {
        let job = self
            .store
            .get(job_id)
            .cloned()
            .ok_or(ExecutionError::JobNotFound(job_id))?;
        if job.owner != owner {
            return Err(ExecutionError::JobNotFound(job_id));
        }

        if job.status == JobStatus::Processing {
            // Signal only. The reaper stays the sole owner of the pid
            // mapping and will see the record gone when the exit lands.
            if let Some(pid) = self.table.pid_for_job_id(job_id) {
                kill_pid(pid);
            }
        }
        if let Some(url) = &job.dynamic_dest_url {
            if let Err(e) = self.leases.return_transfer_destination(url).await {
                warn!(job_id, error = %e, "failed to return lease on removal");
            }
        }
        self.credentials.remove(job_id);
        self.append_history(&job, JobStatus::Removed, Some("removed by owner".to_string()));
        self.store.remove(job_id)?;
        info!(job_id, owner, "job removed");
        Ok(())
    }

    /// Scan jobs in a status in submission order and dispatch while the
    /// concurrency cap allows. The scan halts at the first blocked job,
    /// so a dynamic job waiting on the lease pool holds everything queued
    /// behind it.
    async fn dispatch_sweep(&mut self, status: JobStatus) {
        let max_num_jobs = self.config.read().await.scheduler.max_num_jobs;
        for job_id in self.store.ids_in_status(status) {
            if self.table.running_count() >= max_num_jobs {
                debug!(running = self.table.running_count(), "at concurrency cap");
                return;
            }
            let needs_lease = self
                .store
                .get(job_id)
                .map(|j| j.has_dynamic_dest() && j.dynamic_dest_url.is_none())
                .unwrap_or(false);
            if needs_lease && !self.dynamic_available().await {
                debug!(job_id, "lease pool empty, halting scan");
                return;
            }
            self.try_dispatch(job_id).await;
        }
    }

    /// Lease availability with a negative-answer cache, so an empty pool
    /// is not polled on every sweep.
    async fn dynamic_available(&mut self) -> bool {
        if let Some(until) = self.dynamic_blocked_until {
            if Instant::now() < until {
                return false;
            }
            self.dynamic_blocked_until = None;
        }
        if self.leases.are_matches_available().await {
            true
        } else {
            self.dynamic_blocked_until = Some(Instant::now() + DYNAMIC_RETRY_BACKOFF);
            false
        }
    }

    async fn try_dispatch(&mut self, job_id: JobId) {
        let Some(mut job) = self.store.get(job_id).cloned() else {
            return;
        };

        if job.job_type == JobType::Transfer
            && job.has_dynamic_dest()
            && job.dynamic_dest_url.is_none()
        {
            match self.bind_dynamic_destination(&job).await {
                Ok(Some(url)) => {
                    job.dynamic_dest_url = Some(url.clone());
                    if let Err(e) = self.store.update(job_id, |j| {
                        j.dynamic_dest_url = Some(url);
                    }) {
                        error!(job_id, error = %e, "failed to persist lease binding");
                        return;
                    }
                }
                Ok(None) => {
                    // No match found. Reschedule without consuming a retry.
                    self.dynamic_blocked_until = Some(Instant::now() + DYNAMIC_RETRY_BACKOFF);
                    debug!(job_id, "no match found for dynamic destination");
                    if let Err(e) = self.store.update(job_id, |j| {
                        j.status = JobStatus::Rescheduled;
                        j.last_error = Some("no match found".to_string());
                    }) {
                        error!(job_id, error = %e, "failed to reschedule dynamic job");
                    }
                    return;
                }
                Err(e) => {
                    warn!(job_id, error = %e, "lease service error, rescheduling");
                    let _ = self.store.update(job_id, |j| {
                        j.status = JobStatus::Rescheduled;
                        j.last_error = Some(format!("lease service error: {}", e));
                    });
                    return;
                }
            }
        }

        if job.job_type == JobType::Release && job.lot_id.is_none() {
            match self.find_reservation_lot(&job) {
                Some(lot_id) => {
                    job.lot_id = Some(lot_id.clone());
                    let _ = self.store.update(job_id, |j| j.lot_id = Some(lot_id));
                }
                None => {
                    warn!(job_id, reserve_id = ?job.reserve_id, "no matching reservation");
                    self.fail_job(&job, "no matching reservation".to_string())
                        .await;
                    return;
                }
            }
        }

        let cred_path = self.credentials.resolve(&job).await;
        let plan = match self.dispatcher.plan(&job, cred_path.as_deref()) {
            Ok(plan) => plan,
            Err(e) => {
                self.handle_spawn_failure(job_id, e.to_string()).await;
                return;
            }
        };

        match self.dispatcher.spawn(&job, &plan).await {
            Ok(mut child) => {
                let Some(pid) = child.id() else {
                    self.handle_spawn_failure(job_id, "child exited before wait".to_string())
                        .await;
                    return;
                };
                self.table.insert(job_id, pid);
                if let Err(e) = self.store.update(job_id, |j| {
                    j.status = JobStatus::Processing;
                    j.dispatch_time = Some(Utc::now());
                }) {
                    error!(job_id, error = %e, "failed to mark job processing");
                }
                info!(job_id, pid, module = %plan.module_path.display(), "job dispatched");

                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let exit = match child.wait().await {
                        Ok(status) => ModuleExit::from(status),
                        Err(e) => {
                            error!(pid, error = %e, "wait on module failed");
                            ModuleExit::SERVER_ERROR
                        }
                    };
                    let _ = events.send(SchedulerEvent::ChildExited { pid, exit }).await;
                });
            }
            Err(e) => {
                self.handle_spawn_failure(job_id, e.to_string()).await;
            }
        }
    }

    async fn bind_dynamic_destination(&self, job: &JobRecord) -> ExecutionResult<Option<String>> {
        let protocol = job.transfer_endpoints()?.dest_protocol;
        Ok(self
            .leases
            .get_transfer_directory(&protocol)
            .await?
            .map(|lease| lease.url))
    }

    /// A Release job takes its lot from the completed Reserve job with
    /// the same reservation id.
    fn find_reservation_lot(&self, release: &JobRecord) -> Option<String> {
        let reserve_id = release.reserve_id.as_ref()?;
        self.store
            .all_jobs()
            .find(|j| {
                j.job_type == JobType::Reserve && j.reserve_id.as_deref() == Some(reserve_id)
            })
            .and_then(|j| j.lot_id.clone())
    }

    /// A spawn that never produced a child is a server error, not a job
    /// failure: the job is removed rather than retried.
    async fn handle_spawn_failure(&mut self, job_id: JobId, reason: String) {
        error!(job_id, %reason, "module spawn failed");
        // Route the sentinel through the reaper so the unknown-pid guard
        // records the event in one place.
        self.handle_child_exit(JOB_ID_PLACEHOLDER as u32, ModuleExit::SERVER_ERROR)
            .await;

        let Some(job) = self.store.get(job_id).cloned() else {
            return;
        };
        if let Some(url) = &job.dynamic_dest_url {
            if let Err(e) = self.leases.return_transfer_destination(url).await {
                warn!(job_id, error = %e, "failed to return lease after spawn failure");
            }
        }
        self.credentials.remove(job_id);
        self.append_history(&job, JobStatus::Removed, Some(format!("server error: {}", reason)));
        if let Err(e) = self.store.remove(job_id) {
            error!(job_id, error = %e, "failed to remove job after spawn failure");
        }
    }

    /// Reap one module exit. Unknown pids are logged and ignored; they
    /// are expected after hung-job kills and explicit removals.
    async fn handle_child_exit(&mut self, pid: u32, exit: ModuleExit) {
        let Some(job_id) = self.table.job_id_for_pid(pid) else {
            warn!(pid, exit = %exit.describe(), "exit notification for unknown pid");
            return;
        };
        self.table.remove_by_job_id(job_id);

        let Some(job) = self.store.get(job_id).cloned() else {
            // Removed while running; the kill signal produced this exit.
            debug!(job_id, pid, "exit for already-removed job");
            return;
        };

        let diagnostic = self.read_capture_file(pid);

        if exit.success {
            self.complete_job(&job).await;
        } else {
            let error_text = diagnostic.unwrap_or_else(|| exit.describe());
            self.record_attempt_failure(&job, error_text).await;
        }
    }

    async fn complete_job(&mut self, job: &JobRecord) {
        info!(job_id = job.id, job_type = %job.job_type, "job completed");
        self.credentials.remove(job.id);
        if let Some(url) = &job.dynamic_dest_url {
            if let Err(e) = self.leases.return_transfer_destination(url).await {
                warn!(job_id = job.id, error = %e, "failed to return lease");
            }
        }

        if job.job_type == JobType::Reserve {
            // A completed Reserve stays live so a later Release can find
            // its lot. The Release deletes it.
            let lot_id = self.read_lot_file(job);
            self.append_history(job, JobStatus::Completed, None);
            if let Err(e) = self.store.update(job.id, |j| {
                j.status = JobStatus::Completed;
                j.lot_id = lot_id;
            }) {
                error!(job_id = job.id, error = %e, "failed to mark reservation complete");
            }
            return;
        }

        if job.job_type == JobType::Release {
            self.retire_matching_reservation(job);
        }

        self.append_history(job, JobStatus::Completed, None);
        if let Err(e) = self.store.remove(job.id) {
            error!(job_id = job.id, error = %e, "failed to delete completed job");
        }
    }

    fn retire_matching_reservation(&mut self, release: &JobRecord) {
        let Some(reserve_id) = release.reserve_id.as_deref() else {
            return;
        };
        let reservation = self
            .store
            .all_jobs()
            .find(|j| {
                j.job_type == JobType::Reserve && j.reserve_id.as_deref() == Some(reserve_id)
            })
            .map(|j| j.id);
        if let Some(reservation_id) = reservation {
            debug!(
                job_id = release.id,
                reservation_id, "retiring released reservation"
            );
            if let Err(e) = self.store.remove(reservation_id) {
                error!(reservation_id, error = %e, "failed to retire reservation");
            }
        }
    }

    /// Shared failure bookkeeping for bad exits and hung kills. Counting
    /// is 1-based against max_retry: a job gets at most max_retry total
    /// dispatch attempts.
    async fn record_attempt_failure(&mut self, job: &JobRecord, error_text: String) {
        let max_retry = self.config.read().await.scheduler.max_retry;

        if job.num_attempts + 1 < max_retry {
            debug!(
                job_id = job.id,
                attempt = job.num_attempts + 1,
                error = %error_text,
                "attempt failed, rescheduling"
            );
            if let Err(e) = self.store.update(job.id, |j| {
                j.num_attempts += 1;
                j.advance_protocol_index();
                j.status = JobStatus::Rescheduled;
                j.last_error = Some(error_text);
            }) {
                error!(job_id = job.id, error = %e, "failed to reschedule job");
            }
        } else {
            warn!(
                job_id = job.id,
                attempts = job.num_attempts + 1,
                error = %error_text,
                "job failed for good"
            );
            self.fail_job(job, error_text).await;
        }
    }

    async fn fail_job(&mut self, job: &JobRecord, error_text: String) {
        if let Some(url) = &job.dynamic_dest_url {
            if let Err(e) = self.leases.fail_transfer_destination(url).await {
                warn!(job_id = job.id, error = %e, "failed to report bad lease");
            }
        }
        self.credentials.remove(job.id);
        self.append_history(job, JobStatus::Failed, Some(error_text));
        if let Err(e) = self.store.remove(job.id) {
            error!(job_id = job.id, error = %e, "failed to delete failed job");
        }
    }

    /// Kill Processing jobs that exceeded max_delay. The pid mapping is
    /// removed here, so the real exit notification becomes a no-op.
    async fn hung_job_sweep(&mut self) {
        let cfg = self.config.read().await.scheduler.clone();
        let now = Utc::now();

        for job in self.store.jobs_in_status(JobStatus::Processing) {
            let Some(dispatched) = job.dispatch_time else {
                continue;
            };
            let elapsed = (now - dispatched).to_std().unwrap_or_default();
            if elapsed <= cfg.max_delay {
                continue;
            }

            warn!(
                job_id = job.id,
                elapsed_secs = elapsed.as_secs(),
                "job exceeded max delay, killing"
            );
            if let Some(pid) = self.table.remove_by_job_id(job.id) {
                kill_pid(pid);
            }
            if let Some(url) = &job.dynamic_dest_url {
                // The destination itself is healthy. It goes back to the
                // pool, and a fresh lease is taken on the next attempt.
                if let Err(e) = self.leases.return_transfer_destination(url).await {
                    warn!(job_id = job.id, error = %e, "failed to return lease of hung job");
                }
                let _ = self.store.update(job.id, |j| j.dynamic_dest_url = None);
            }
            let mut hung = job.clone();
            hung.dynamic_dest_url = None;
            self.record_attempt_failure(&hung, "hung: exceeded maximum processing delay".to_string())
                .await;
        }
    }

    /// One-line diagnostic a module may leave behind, keyed by its pid.
    /// Read once, then deleted.
    fn read_capture_file(&self, pid: u32) -> Option<String> {
        let path = self.dispatcher_paths().capture_file(pid);
        let text = std::fs::read_to_string(&path).ok()?;
        let _ = std::fs::remove_file(&path);
        let line = text.lines().next()?.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }

    /// The lot identifier a Reserve module wrote into its output file.
    fn read_lot_file(&self, job: &JobRecord) -> Option<String> {
        let path = job.output_file.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(text) => text.lines().next().map(|l| l.trim().to_string()),
            Err(e) => {
                warn!(job_id = job.id, path = %path, error = %e, "cannot read lot file");
                None
            }
        }
    }

    fn append_history(&mut self, job: &JobRecord, status: JobStatus, error: Option<String>) {
        let record = HistoryRecord::terminal(job, status, error);
        if let Err(e) = self.history.append(&record) {
            error!(job_id = job.id, error = %e, "failed to write history record");
        }
    }

    fn dispatcher_paths(&self) -> &ferry_config::PathsConfig {
        self.dispatcher.paths()
    }

    /// Return every outstanding lease and compact the queue log.
    async fn shutdown(&mut self) {
        info!("scheduler shutting down");
        let bound: Vec<(JobId, String)> = self
            .store
            .all_jobs()
            .filter_map(|j| j.dynamic_dest_url.clone().map(|url| (j.id, url)))
            .collect();
        for (job_id, url) in bound {
            if let Err(e) = self.leases.return_transfer_destination(&url).await {
                warn!(job_id, error = %e, "failed to return lease at shutdown");
            }
        }
        if let Err(e) = self.store.compact() {
            error!(error = %e, "queue log compaction at shutdown failed");
        }
    }
}

fn kill_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!(pid, error = %e, "kill failed");
    }
}
