//! Running-job table: pid <-> job id bookkeeping for live modules

use ferry_core::{JobId, JOB_ID_PLACEHOLDER};

/// One live module process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningJob {
    pub job_id: JobId,
    pub pid: u32,
}

/// Table of module processes currently counted against the concurrency
/// cap. The count is tracked separately from the entries so a dispatch
/// that fails before a pid exists can still be accounted for.
#[derive(Debug, Default)]
pub struct RunningJobTable {
    entries: Vec<RunningJob>,
    running: usize,
}

impl RunningJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatched module and take a concurrency slot.
    pub fn insert(&mut self, job_id: JobId, pid: u32) {
        self.entries.push(RunningJob { job_id, pid });
        self.running += 1;
    }

    /// Release the slot for a job. The placeholder id only decrements
    /// the counter. Returns the pid that was mapped, if any.
    pub fn remove_by_job_id(&mut self, job_id: JobId) -> Option<u32> {
        if job_id == JOB_ID_PLACEHOLDER {
            self.running = self.running.saturating_sub(1);
            return None;
        }
        let pos = self.entries.iter().position(|e| e.job_id == job_id)?;
        let entry = self.entries.swap_remove(pos);
        self.running = self.running.saturating_sub(1);
        Some(entry.pid)
    }

    pub fn job_id_for_pid(&self, pid: u32) -> Option<JobId> {
        self.entries.iter().find(|e| e.pid == pid).map(|e| e.job_id)
    }

    pub fn pid_for_job_id(&self, job_id: JobId) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.job_id == job_id)
            .map(|e| e.pid)
    }

    pub fn contains_job(&self, job_id: JobId) -> bool {
        self.entries.iter().any(|e| e.job_id == job_id)
    }

    /// Jobs currently counted, including placeholder slots.
    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.entries.iter().map(|e| e.job_id).collect()
    }
}
