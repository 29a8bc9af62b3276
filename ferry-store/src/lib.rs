//! Durable job queue and outcome history for ferryd
//!
//! Both stores are newline-delimited JSON files: the queue log is a
//! replayable write-ahead log, the history file is strictly append-only.

pub mod error;
pub mod history;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use history::HistoryLog;
pub use store::JobStore;
