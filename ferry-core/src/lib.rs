//! Domain types shared by the ferryd scheduler crates

pub mod error;
pub mod job;
pub mod url;

pub use error::CoreError;
pub use job::{
    HistoryRecord, JobDescription, JobId, JobRecord, JobStatus, JobType, ProtocolPair,
    TransferEndpoints, DYNAMIC_DEST_HOST, JOB_ID_PLACEHOLDER,
};
pub use url::SiteUrl;
