//! Protocol-level framing: a round trip for `daemon.status` speaking the
//! 4-byte length-prefix directly, plus the boundary cases the server must
//! handle without dropping the connection it doesn't have to.

use crate::prelude::*;
use oj_wire::{read_message, write_message, Request, Response};
use tokio::net::UnixStream;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime")
}

#[test]
fn raw_frame_round_trip_for_daemon_status() {
    let daemon = Project::empty();
    daemon.start_daemon();

    runtime().block_on(async {
        let mut stream = UnixStream::connect(daemon.socket_path()).await.expect("connect to socket");
        let req = Request::new("1", "daemon.status", serde_json::Value::Null);
        write_message(&mut stream, &serde_json::to_vec(&req).unwrap()).await.unwrap();

        let body = read_message(&mut stream).await.expect("read response frame");
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.id, "1");
        assert!(resp.is_ok(), "daemon.status should succeed: {:?}", resp.error);
        assert_eq!(resp.result.unwrap()["state"], "running");
    });
}

#[test]
fn oversize_frame_is_rejected_without_reading_a_body() {
    let daemon = Project::empty();
    daemon.start_daemon();

    runtime().block_on(async {
        use tokio::io::AsyncWriteExt;
        let mut stream = UnixStream::connect(daemon.socket_path()).await.expect("connect to socket");
        // 11 MiB declared length, well past the 10 MiB ceiling, and no body
        // at all — the server must reject based on the length prefix alone.
        let huge_len: u32 = 11 * 1024 * 1024;
        stream.write_all(&huge_len.to_be_bytes()).await.unwrap();

        let body = read_message(&mut stream).await.expect("server should respond instead of hanging");
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert!(!resp.is_ok());
        assert!(resp.error.unwrap().message.contains("exceeds"));
    });
}

#[test]
fn malformed_json_gets_a_parse_error_and_the_connection_stays_open() {
    let daemon = Project::empty();
    daemon.start_daemon();

    runtime().block_on(async {
        let mut stream = UnixStream::connect(daemon.socket_path()).await.expect("connect to socket");
        write_message(&mut stream, b"not json at all").await.unwrap();

        let body = read_message(&mut stream).await.expect("read parse-error response");
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert!(!resp.is_ok());
        assert_eq!(resp.error.unwrap().code, -32700);

        // The connection must still be usable for a well-formed request.
        let req = Request::new("2", "daemon.status", serde_json::Value::Null);
        write_message(&mut stream, &serde_json::to_vec(&req).unwrap()).await.unwrap();
        let body = read_message(&mut stream).await.expect("read second response");
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert!(resp.is_ok());
    });
}

#[test]
fn idle_connection_is_closed_after_the_configured_timeout() {
    let daemon = Project::empty();
    daemon.start_daemon_with(&[("OJ_RPC_IDLE_TIMEOUT_SECS", "1")]);

    runtime().block_on(async {
        let mut stream = UnixStream::connect(daemon.socket_path()).await.expect("connect to socket");
        // Send nothing; the server should close the connection once its
        // idle timeout elapses rather than holding it open forever.
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        let result = read_message(&mut stream).await;
        assert!(result.is_err(), "server should have closed the idle connection");
    });
}

#[test]
fn unknown_method_is_method_not_found() {
    let daemon = Project::empty();
    daemon.start_daemon();

    runtime().block_on(async {
        let mut stream = UnixStream::connect(daemon.socket_path()).await.expect("connect to socket");
        let req = Request::new("9", "worker.teleport", serde_json::Value::Null);
        write_message(&mut stream, &serde_json::to_vec(&req).unwrap()).await.unwrap();
        let body = read_message(&mut stream).await.unwrap();
        let resp: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);
    });
}
