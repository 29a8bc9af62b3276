//! Scheduler limits and monitor periods

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Scheduling limits, retry policy and monitor periods.
///
/// The monitor periods are re-read on every firing, so a config reload
/// takes effect without restarting the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently Processing jobs
    pub max_num_jobs: usize,

    /// Maximum total dispatch attempts before a job fails for good
    pub max_retry: u32,

    /// A Processing job older than this is considered hung
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Period of the Received-job dispatch monitor
    #[serde(with = "humantime_serde")]
    pub dispatch_interval: Duration,

    /// Period of the hung-job monitor
    #[serde(with = "humantime_serde")]
    pub hung_job_interval: Duration,

    /// Period of the Rescheduled-job redispatch monitor
    #[serde(with = "humantime_serde")]
    pub reschedule_interval: Duration,

    /// Period of the write-ahead log compaction timer
    #[serde(with = "humantime_serde")]
    pub compaction_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_num_jobs: 10,
            max_retry: 10,
            max_delay: Duration::from_secs(10 * 60),
            dispatch_interval: Duration::from_secs(10),
            hung_job_interval: Duration::from_secs(60),
            reschedule_interval: Duration::from_secs(30),
            compaction_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Validatable for SchedulerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_num_jobs, "max_num_jobs", self.domain_name())?;
        validate_positive(self.max_retry, "max_retry", self.domain_name())?;
        validate_positive(
            self.max_delay.as_secs(),
            "max_delay",
            self.domain_name(),
        )?;
        validate_positive(
            self.dispatch_interval.as_millis(),
            "dispatch_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.hung_job_interval.as_millis(),
            "hung_job_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.reschedule_interval.as_millis(),
            "reschedule_interval",
            self.domain_name(),
        )?;
        validate_positive(
            self.compaction_interval.as_secs(),
            "compaction_interval",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scheduler"
    }
}
