//! Request protocol over a real TCP connection

mod common;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use ferry_core::JobStatus;
use ferry_server::{
    Authenticator, ClientRequest, Envelope, RequestServer, ServerReply, StatusResult,
};

use common::{current_user, transfer_desc, Harness};

struct TestAuth;

impl Authenticator for TestAuth {
    fn authenticate(&self, _principal: &str, token: &str) -> bool {
        token == "s3cret"
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, request: ClientRequest) -> ServerReply {
        let mut line = serde_json::to_string(&Envelope::new(request)).unwrap();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();

        let mut reply = String::new();
        self.reader.read_line(&mut reply).await.unwrap();
        let envelope: Envelope<ServerReply> = serde_json::from_str(reply.trim_end()).unwrap();
        envelope.open().unwrap()
    }

    async fn auth(&mut self, principal: &str, token: &str) -> ServerReply {
        self.send(ClientRequest::Auth {
            principal: principal.to_string(),
            token: token.to_string(),
        })
        .await
    }
}

async fn start_server(h: &Harness) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RequestServer::new(h.handle.clone(), Arc::new(TestAuth));
    tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });
    addr
}

#[tokio::test]
async fn submit_status_list_remove_round_trip() {
    let h = Harness::start().await;
    h.install_module("transfer.ftp-ftp", "sleep 60");
    let addr = start_server(&h).await;

    let mut client = Client::connect(addr).await;
    assert!(matches!(
        client.auth(&current_user(), "s3cret").await,
        ServerReply::AuthOk
    ));

    let reply = client
        .send(ClientRequest::Submit {
            description: transfer_desc("ftp://a.example.org/f", "ftp://b.example.org/f"),
            credential: None,
        })
        .await;
    let ServerReply::Submitted { job_id } = reply else {
        panic!("unexpected reply: {:?}", reply);
    };
    assert!(matches!(
        client.send(ClientRequest::SubmitEnd).await,
        ServerReply::SubmitEndOk
    ));

    let ServerReply::Jobs { jobs } = client.send(ClientRequest::List).await else {
        panic!("expected job list");
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job_id);

    let ServerReply::Status { result } = client.send(ClientRequest::Status { job_id }).await
    else {
        panic!("expected status");
    };
    assert!(matches!(result, StatusResult::Live { .. }));

    assert!(matches!(
        client.send(ClientRequest::Remove { job_id }).await,
        ServerReply::Removed { .. }
    ));
    let ServerReply::Status { result } = client.send(ClientRequest::Status { job_id }).await
    else {
        panic!("expected status");
    };
    let StatusResult::Historical { record } = result else {
        panic!("expected historical record");
    };
    assert_eq!(record.status, JobStatus::Removed);
}

#[tokio::test]
async fn commands_require_authentication_first() {
    let h = Harness::start().await;
    let addr = start_server(&h).await;

    // command before auth is refused and the connection dropped
    let mut client = Client::connect(addr).await;
    let reply = client.send(ClientRequest::List).await;
    assert!(matches!(reply, ServerReply::Error { .. }));

    // bad token likewise
    let mut client = Client::connect(addr).await;
    let reply = client.auth(&current_user(), "wrong").await;
    assert!(matches!(reply, ServerReply::Error { .. }));
}

#[tokio::test]
async fn inline_credential_reaches_the_module() {
    use base64::Engine as _;

    let h = Harness::start().await;
    // the module copies the credential file it was pointed at
    h.install_module(
        "transfer.ftp-ftp",
        "cat \"$FERRY_CREDENTIAL_FILE\" > seen.cred\nexit 0",
    );
    let addr = start_server(&h).await;

    let mut client = Client::connect(addr).await;
    client.auth(&current_user(), "s3cret").await;

    let reply = client
        .send(ClientRequest::Submit {
            description: transfer_desc("ftp://a.example.org/f", "ftp://b.example.org/f"),
            credential: Some(base64::engine::general_purpose::STANDARD.encode(b"proxy-bytes")),
        })
        .await;
    let ServerReply::Submitted { job_id } = reply else {
        panic!("unexpected reply: {:?}", reply);
    };

    h.wait_for(job_id, common::is_completed).await;
    let seen = std::fs::read(h.log_dir().join("seen.cred")).unwrap();
    assert_eq!(seen, b"proxy-bytes");

    // the per-job credential file is cleaned up with the job
    assert!(!h.dir.path().join(format!("cred-{}", job_id)).exists());
}

#[tokio::test]
async fn status_of_unknown_job_is_not_found() {
    let h = Harness::start().await;
    let addr = start_server(&h).await;

    let mut client = Client::connect(addr).await;
    client.auth(&current_user(), "s3cret").await;

    let ServerReply::Status { result } = client.send(ClientRequest::Status { job_id: 999 }).await
    else {
        panic!("expected status");
    };
    assert!(matches!(result, StatusResult::NotFound));
}
