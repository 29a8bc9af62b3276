//! TCP request server
//!
//! One task per connection. A connection authenticates once, then issues
//! any number of commands; every command is forwarded to the scheduler
//! through its handle and answered in order.

use std::sync::Arc;

use base64::Engine as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use ferry_execution::{SchedulerHandle, StatusReport};

use crate::auth::Authenticator;
use crate::error::{ServerError, ServerResult};
use crate::protocol::{ClientRequest, Envelope, ServerReply, StatusResult};

pub struct RequestServer {
    scheduler: SchedulerHandle,
    auth: Arc<dyn Authenticator>,
}

impl RequestServer {
    pub fn new(scheduler: SchedulerHandle, auth: Arc<dyn Authenticator>) -> Self {
        Self { scheduler, auth }
    }

    /// Bind and accept until the task is dropped.
    pub async fn serve(self, bind_addr: &str) -> ServerResult<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!(addr = %listener.local_addr()?, "request server listening");
        self.serve_on(listener).await
    }

    /// Accept loop over an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> ServerResult<()> {
        let server = Arc::new(self);
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "client connected");
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    match e {
                        ServerError::ConnectionClosed => debug!(%peer, "client disconnected"),
                        e => warn!(%peer, error = %e, "connection error"),
                    }
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> ServerResult<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let principal = self.authenticate(&mut reader, &mut write_half).await?;

        loop {
            let request = match read_request(&mut reader).await {
                Ok(request) => request,
                Err(ServerError::ConnectionClosed) => return Ok(()),
                Err(e) => {
                    write_reply(
                        &mut write_half,
                        &ServerReply::Error {
                            message: e.to_string(),
                        },
                    )
                    .await?;
                    return Err(e);
                }
            };
            let reply = self.execute(&principal, request).await;
            write_reply(&mut write_half, &reply).await?;
        }
    }

    /// The first message must be Auth. Anything else, or a bad token,
    /// ends the connection.
    async fn authenticate(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
    ) -> ServerResult<String> {
        let request = read_request(reader).await?;
        let ClientRequest::Auth { principal, token } = request else {
            write_reply(
                writer,
                &ServerReply::Error {
                    message: "authentication required".to_string(),
                },
            )
            .await?;
            return Err(ServerError::NotAuthenticated);
        };
        if !self.auth.authenticate(&principal, &token) {
            warn!(%principal, "authentication failed");
            write_reply(
                writer,
                &ServerReply::Error {
                    message: "authentication failed".to_string(),
                },
            )
            .await?;
            return Err(ServerError::AuthenticationFailed);
        }
        debug!(%principal, "client authenticated");
        write_reply(writer, &ServerReply::AuthOk).await?;
        Ok(principal)
    }

    async fn execute(&self, principal: &str, request: ClientRequest) -> ServerReply {
        match request {
            ClientRequest::Auth { .. } => ServerReply::Error {
                message: "already authenticated".to_string(),
            },
            ClientRequest::Submit {
                description,
                credential,
            } => {
                let inline_cred = match credential
                    .map(|b64| base64::engine::general_purpose::STANDARD.decode(b64))
                    .transpose()
                {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return ServerReply::Error {
                            message: format!("invalid credential encoding: {}", e),
                        }
                    }
                };
                match self
                    .scheduler
                    .submit(principal.to_string(), description, inline_cred)
                    .await
                {
                    Ok(job_id) => ServerReply::Submitted { job_id },
                    Err(e) => ServerReply::Error {
                        message: e.to_string(),
                    },
                }
            }
            ClientRequest::SubmitEnd => ServerReply::SubmitEndOk,
            ClientRequest::Status { job_id } => match self.scheduler.status(job_id).await {
                Ok(StatusReport::Live(job)) => ServerReply::Status {
                    result: StatusResult::Live { job },
                },
                Ok(StatusReport::Historical(record)) => ServerReply::Status {
                    result: StatusResult::Historical { record },
                },
                Ok(StatusReport::NotFound) => ServerReply::Status {
                    result: StatusResult::NotFound,
                },
                Err(e) => ServerReply::Error {
                    message: e.to_string(),
                },
            },
            ClientRequest::List => match self.scheduler.list(principal.to_string()).await {
                Ok(jobs) => ServerReply::Jobs { jobs },
                Err(e) => ServerReply::Error {
                    message: e.to_string(),
                },
            },
            ClientRequest::Remove { job_id } => {
                match self.scheduler.remove(principal.to_string(), job_id).await {
                    Ok(()) => ServerReply::Removed { job_id },
                    Err(e) => ServerReply::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

async fn read_request(reader: &mut BufReader<OwnedReadHalf>) -> ServerResult<ClientRequest> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ServerError::ConnectionClosed);
    }
    let envelope: Envelope<ClientRequest> = serde_json::from_str(line.trim_end())?;
    envelope.open()
}

async fn write_reply(writer: &mut OwnedWriteHalf, reply: &ServerReply) -> ServerResult<()> {
    let mut line = serde_json::to_string(&Envelope::new(reply))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
