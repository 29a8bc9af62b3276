//! Write-ahead logged job queue
//!
//! The live queue is a `BTreeMap` keyed by job id, mirrored to an
//! append-only log of newline-delimited JSON operations. Every mutation
//! is flushed to the log before the in-memory map changes, so a crash
//! replays to exactly the acknowledged state.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ferry_core::{JobId, JobRecord, JobStatus};

use crate::error::{StoreError, StoreResult};

/// One logged mutation
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogOp {
    Put { job: JobRecord },
    Remove { id: JobId },
}

/// Durable queue of live jobs
pub struct JobStore {
    jobs: BTreeMap<JobId, JobRecord>,
    writer: BufWriter<File>,
    path: PathBuf,
    /// Highest id ever logged; ids are never reused, even across restarts
    last_id: JobId,
}

impl JobStore {
    /// Open the queue log at `path`, replaying any existing entries.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut jobs = BTreeMap::new();
        let mut last_id = 0;

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let op: LogOp = serde_json::from_str(&line).map_err(|e| {
                    warn!(line = line_no + 1, path = %path.display(), "corrupt queue log entry");
                    StoreError::CorruptEntry(e)
                })?;
                match op {
                    LogOp::Put { job } => {
                        last_id = last_id.max(job.id);
                        jobs.insert(job.id, job);
                    }
                    LogOp::Remove { id } => {
                        last_id = last_id.max(id);
                        jobs.remove(&id);
                    }
                }
            }
            info!(
                path = %path.display(),
                jobs = jobs.len(),
                last_id,
                "replayed queue log"
            );
        }

        let writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);

        Ok(Self {
            jobs,
            writer,
            path,
            last_id,
        })
    }

    /// Allocate the next job id.
    pub fn next_job_id(&mut self) -> JobId {
        self.last_id += 1;
        self.last_id
    }

    /// Raise the id floor, typically to the highest id in the history
    /// file. Compaction drops Remove entries, so the queue log alone can
    /// under-report the last id handed out.
    pub fn ensure_last_id(&mut self, floor: JobId) {
        self.last_id = self.last_id.max(floor);
    }

    /// Insert or replace a record, logging first.
    pub fn put(&mut self, job: JobRecord) -> StoreResult<()> {
        self.last_id = self.last_id.max(job.id);
        self.append(&LogOp::Put { job: job.clone() })?;
        self.jobs.insert(job.id, job);
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        self.jobs.get(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Mutate a record in place through a closure, logging the result.
    pub fn update<F>(&mut self, id: JobId, f: F) -> StoreResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut job = self
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::JobNotFound(id))?;
        f(&mut job);
        self.append(&LogOp::Put { job: job.clone() })?;
        self.jobs.insert(id, job.clone());
        Ok(job)
    }

    /// Remove a record from the live queue, logging first.
    pub fn remove(&mut self, id: JobId) -> StoreResult<JobRecord> {
        if !self.jobs.contains_key(&id) {
            return Err(StoreError::JobNotFound(id));
        }
        self.append(&LogOp::Remove { id })?;
        // unwrap is safe: presence checked above and no await between
        Ok(self.jobs.remove(&id).unwrap())
    }

    /// Jobs in a given status, in id order.
    pub fn jobs_in_status(&self, status: JobStatus) -> Vec<JobRecord> {
        self.jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    /// Ids of jobs in a given status, in id order.
    pub fn ids_in_status(&self, status: JobStatus) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|j| j.status == status)
            .map(|j| j.id)
            .collect()
    }

    pub fn all_jobs(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Rewrite the log so it holds one Put per live job. Writes a sibling
    /// temp file and renames it into place, then reopens the writer.
    pub fn compact(&mut self) -> StoreResult<()> {
        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for job in self.jobs.values() {
                serde_json::to_writer(&mut tmp, &LogOp::Put { job: job.clone() })?;
                tmp.write_all(b"\n")?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        debug!(path = %self.path.display(), jobs = self.jobs.len(), "compacted queue log");
        Ok(())
    }

    fn append(&mut self, op: &LogOp) -> StoreResult<()> {
        serde_json::to_writer(&mut self.writer, op)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ferry_core::{JobDescription, JobType};

    fn record(id: JobId) -> JobRecord {
        let desc = JobDescription {
            job_type: JobType::Transfer,
            src_url: "ftp://a.example.org/f".to_string(),
            dest_url: "ftp://b.example.org/f".to_string(),
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
        };
        JobRecord::from_description(id, "alice", Utc::now(), desc)
    }

    #[test]
    fn put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JobStore::open(dir.path().join("queue")).unwrap();

        let id = store.next_job_id();
        assert_eq!(id, 1);
        store.put(record(id)).unwrap();
        assert!(store.contains(id));

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(!store.contains(id));
        assert!(matches!(
            store.remove(id),
            Err(StoreError::JobNotFound(1))
        ));
    }

    #[test]
    fn replay_restores_state_and_last_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue");

        {
            let mut store = JobStore::open(&path).unwrap();
            for _ in 0..3 {
                let id = store.next_job_id();
                store.put(record(id)).unwrap();
            }
            store
                .update(2, |j| j.status = JobStatus::Processing)
                .unwrap();
            store.remove(1).unwrap();
        }

        let mut store = JobStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.contains(1));
        assert_eq!(store.get(2).unwrap().status, JobStatus::Processing);
        // removed ids still count toward allocation
        assert_eq!(store.next_job_id(), 4);
    }

    #[test]
    fn compaction_preserves_live_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue");

        let mut store = JobStore::open(&path).unwrap();
        for _ in 0..5 {
            let id = store.next_job_id();
            store.put(record(id)).unwrap();
        }
        store.remove(2).unwrap();
        store.remove(4).unwrap();
        store.compact().unwrap();

        // log now has exactly one line per live job
        let lines = std::fs::read_to_string(&path).unwrap();
        assert_eq!(lines.lines().count(), 3);

        // and mutation after compaction still appends
        store
            .update(3, |j| j.status = JobStatus::Rescheduled)
            .unwrap();
        let store = JobStore::open(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(3).unwrap().status, JobStatus::Rescheduled);
    }

    #[test]
    fn status_queries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JobStore::open(dir.path().join("queue")).unwrap();
        for _ in 0..3 {
            let id = store.next_job_id();
            store.put(record(id)).unwrap();
        }
        store
            .update(2, |j| j.status = JobStatus::Processing)
            .unwrap();

        assert_eq!(store.ids_in_status(JobStatus::Received), vec![1, 3]);
        assert_eq!(store.jobs_in_status(JobStatus::Processing).len(), 1);
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue");
        std::fs::write(&path, "{not json\n").unwrap();
        assert!(matches!(
            JobStore::open(&path),
            Err(StoreError::CorruptEntry(_))
        ));
    }
}
