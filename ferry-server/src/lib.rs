//! Request protocol server for ferryd
//!
//! Newline-delimited JSON envelopes over TCP, authenticated per
//! connection, forwarded to the scheduler task.

pub mod auth;
pub mod error;
pub mod protocol;
pub mod server;

pub use auth::{Authenticator, StaticTokenAuthenticator};
pub use error::{ServerError, ServerResult};
pub use protocol::{ClientRequest, Envelope, ServerReply, StatusResult, WIRE_PROTOCOL_VERSION};
pub use server::RequestServer;
