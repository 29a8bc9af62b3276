//! Append-only history of terminal job outcomes

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use ferry_core::{HistoryRecord, JobId};

use crate::error::StoreResult;

/// Newline-delimited JSON log of jobs that left the live queue.
/// Records are only ever appended; status queries for departed jobs
/// scan it from the start.
pub struct HistoryLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl HistoryLog {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        Ok(Self { writer, path })
    }

    pub fn append(&mut self, record: &HistoryRecord) -> StoreResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        debug!(job_id = record.job_id, status = %record.status, "history record written");
        Ok(())
    }

    /// Find the terminal record for a job, if it ever reached one.
    /// A job id appears at most once.
    pub fn find(&self, job_id: JobId) -> StoreResult<Option<HistoryRecord>> {
        let reader = BufReader::new(File::open(&self.path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: HistoryRecord = serde_json::from_str(&line)?;
            if record.job_id == job_id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Highest job id in the history, for id allocation after the queue
    /// log has been compacted away.
    pub fn max_job_id(&self) -> StoreResult<JobId> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut max = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: HistoryRecord = serde_json::from_str(&line)?;
            max = max.max(record.job_id);
        }
        Ok(max)
    }
}
