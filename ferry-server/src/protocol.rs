//! Request protocol message types
//!
//! Clients speak newline-delimited JSON envelopes over a persistent TCP
//! connection. The first message on a connection must authenticate;
//! nothing else is consumed before that succeeds.

use serde::{Deserialize, Serialize};

use ferry_core::{HistoryRecord, JobDescription, JobId, JobRecord};

use crate::error::{ServerError, ServerResult};

/// Wire protocol version for compatibility checking
pub const WIRE_PROTOCOL_VERSION: u32 = 1;

/// Envelope wrapping every message in both directions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    pub message: T,
}

impl<T> Envelope<T> {
    pub fn new(message: T) -> Self {
        Self {
            version: WIRE_PROTOCOL_VERSION,
            message,
        }
    }

    /// Unwrap the payload, rejecting foreign protocol versions.
    pub fn open(self) -> ServerResult<T> {
        if self.version != WIRE_PROTOCOL_VERSION {
            return Err(ServerError::VersionMismatch {
                expected: WIRE_PROTOCOL_VERSION,
                got: self.version,
            });
        }
        Ok(self.message)
    }
}

/// Messages sent from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Must be the first message on a connection
    Auth { principal: String, token: String },

    /// One job of a submit batch. The credential, when present, is
    /// base64-encoded bytes written to the per-job credential file.
    Submit {
        description: JobDescription,
        credential: Option<String>,
    },

    /// End of a submit batch
    SubmitEnd,

    /// Query one job, live or historical
    Status { job_id: JobId },

    /// All live jobs owned by the authenticated principal
    List,

    /// Remove a job, killing its module if running
    Remove { job_id: JobId },
}

/// Messages sent from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    AuthOk,

    /// Assigned id for one submitted job
    Submitted { job_id: JobId },

    SubmitEndOk,

    Status { result: StatusResult },

    Jobs { jobs: Vec<JobRecord> },

    Removed { job_id: JobId },

    Error { message: String },
}

/// Outcome of a status query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "found", rename_all = "snake_case")]
pub enum StatusResult {
    Live { job: JobRecord },
    Historical { record: HistoryRecord },
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_rejects_foreign_version() {
        let env = Envelope {
            version: 99,
            message: ClientRequest::List,
        };
        assert!(matches!(
            env.open(),
            Err(ServerError::VersionMismatch { got: 99, .. })
        ));
    }

    #[test]
    fn request_wire_format() {
        let json = r#"{"version":1,"message":{"type":"status","job_id":12}}"#;
        let env: Envelope<ClientRequest> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            env.open().unwrap(),
            ClientRequest::Status { job_id: 12 }
        ));
    }

    #[test]
    fn auth_round_trips() {
        let env = Envelope::new(ClientRequest::Auth {
            principal: "alice".to_string(),
            token: "s3cret".to_string(),
        });
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope<ClientRequest> = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.message, ClientRequest::Auth { .. }));
    }
}
