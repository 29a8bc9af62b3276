//! Job records and their lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::url::SiteUrl;

/// Monotonically increasing job identifier, assigned once and never reused
pub type JobId = u64;

/// Reserved placeholder id: removing it from the running-job table only
/// decrements the running counter, it never refers to a real job.
pub const JOB_ID_PLACEHOLDER: JobId = 0;

/// Host marker for destinations resolved from the lease pool at dispatch time
pub const DYNAMIC_DEST_HOST: &str = "$DYNAMIC";

/// Kind of placement work a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Transfer,
    Reserve,
    Release,
    RequestPath,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Transfer => write!(f, "transfer"),
            JobType::Reserve => write!(f, "reserve"),
            JobType::Release => write!(f, "release"),
            JobType::RequestPath => write!(f, "requestpath"),
        }
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Received,
    Processing,
    Rescheduled,
    Completed,
    Failed,
    Removed,
}

impl JobStatus {
    /// Terminal states delete the live record and append a history record.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Removed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Received => write!(f, "received"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Rescheduled => write!(f, "rescheduled"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Removed => write!(f, "removed"),
        }
    }
}

/// One alternate (source protocol, destination protocol) pair for a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolPair {
    pub src: String,
    pub dest: String,
}

/// Submit-time description of a job, as sent by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_type: JobType,
    #[serde(default)]
    pub src_url: String,
    #[serde(default)]
    pub dest_url: String,
    /// Extra module arguments, appended after the positional ones
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Ordered alternate protocol pairs tried after the primary pair fails
    #[serde(default)]
    pub alt_protocols: Vec<ProtocolPair>,
    /// Name of a delegated credential to fetch at every dispatch
    #[serde(default)]
    pub cred_name: Option<String>,
    #[serde(default)]
    pub log_notes: Option<String>,
    /// Module stdio redirections; null device when absent
    #[serde(default)]
    pub input_file: Option<String>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub error_file: Option<String>,
    // Reserve/Release bookkeeping
    #[serde(default)]
    pub reserve_id: Option<String>,
    #[serde(default)]
    pub reserve_size: Option<u64>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// A live job record, owned exclusively by the job store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub owner: String,
    pub submit_time: DateTime<Utc>,
    /// Stamped on every transition to Processing, read by the hung-job monitor
    pub dispatch_time: Option<DateTime<Utc>>,
    pub num_attempts: u32,
    /// 0 selects the primary URL pair, i >= 1 selects `alt_protocols[i-1]`
    pub protocol_index: u32,
    pub src_url: String,
    pub dest_url: String,
    pub arguments: Vec<String>,
    pub alt_protocols: Vec<ProtocolPair>,
    pub cred_name: Option<String>,
    /// Path of a credential submitted inline with the job
    pub inline_cred_path: Option<String>,
    /// Concrete destination bound from the lease pool, if any
    pub dynamic_dest_url: Option<String>,
    pub last_error: Option<String>,
    pub log_notes: Option<String>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub error_file: Option<String>,
    pub reserve_id: Option<String>,
    pub reserve_size: Option<u64>,
    pub duration_secs: Option<u64>,
    /// Lot identifier reported by a completed Reserve, consumed by Release
    pub lot_id: Option<String>,
}

/// URLs and protocols a transfer dispatch will actually use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEndpoints {
    pub src_url: String,
    pub dest_url: String,
    pub src_protocol: String,
    pub dest_protocol: String,
}

impl JobRecord {
    /// Build a fresh Received record from a submitted description.
    pub fn from_description(
        id: JobId,
        owner: impl Into<String>,
        submit_time: DateTime<Utc>,
        desc: JobDescription,
    ) -> Self {
        Self {
            id,
            job_type: desc.job_type,
            status: JobStatus::Received,
            owner: owner.into(),
            submit_time,
            dispatch_time: None,
            num_attempts: 0,
            protocol_index: 0,
            src_url: desc.src_url,
            dest_url: desc.dest_url,
            arguments: desc.arguments,
            alt_protocols: desc.alt_protocols,
            cred_name: desc.cred_name,
            inline_cred_path: None,
            dynamic_dest_url: None,
            last_error: None,
            log_notes: desc.log_notes,
            input_file: desc.input_file,
            output_file: desc.output_file,
            error_file: desc.error_file,
            reserve_id: desc.reserve_id,
            reserve_size: desc.reserve_size,
            duration_secs: desc.duration_secs,
            lot_id: None,
        }
    }

    /// Whether the destination must be resolved from the lease pool.
    pub fn has_dynamic_dest(&self) -> bool {
        self.dest_url.contains(DYNAMIC_DEST_HOST)
    }

    /// Resolve the URLs for the current protocol index. Index 0 uses the
    /// primary pair as submitted; index i rewrites both URLs with
    /// `alt_protocols[i-1]`.
    pub fn transfer_endpoints(&self) -> Result<TransferEndpoints, CoreError> {
        let src = SiteUrl::parse(&self.src_url)?;
        let dest = SiteUrl::parse(&self.dest_url)?;

        if self.protocol_index == 0 {
            return Ok(TransferEndpoints {
                src_url: src.to_string(),
                dest_url: dest.to_string(),
                src_protocol: src.protocol,
                dest_protocol: dest.protocol,
            });
        }

        let pair = self
            .alt_protocols
            .get(self.protocol_index as usize - 1)
            .ok_or(CoreError::ProtocolIndexOutOfRange(
                self.id,
                self.protocol_index,
            ))?;

        Ok(TransferEndpoints {
            src_url: src.with_protocol(&pair.src),
            dest_url: dest.with_protocol(&pair.dest),
            src_protocol: pair.src.clone(),
            dest_protocol: pair.dest.clone(),
        })
    }

    /// Advance to the next alternate protocol pair, wrapping back to the
    /// primary pair once every alternate has been tried.
    pub fn advance_protocol_index(&mut self) {
        if (self.protocol_index as usize) < self.alt_protocols.len() {
            self.protocol_index += 1;
        } else {
            self.protocol_index = 0;
        }
    }
}

/// Append-only record of a terminal outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub job_id: JobId,
    pub job_type: JobType,
    pub owner: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Record the terminal outcome of a job leaving the live store.
    pub fn terminal(job: &JobRecord, status: JobStatus, error: Option<String>) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type,
            owner: job.owner.clone(),
            status,
            error,
            timestamp: Utc::now(),
        }
    }
}
