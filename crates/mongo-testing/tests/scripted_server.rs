//! Scripted server behavior with a plain tokio client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mongo_testing::{ScriptedServer, ScriptedServerError, Step};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_sends_and_records() {
    let server = ScriptedServer::start(vec![
        Step::send(b"hel"),
        Step::pause_ms(10),
        Step::send(b"lo"),
        Step::Expect(3),
        Step::Close,
    ])
    .await
    .unwrap();

    let mut client = TcpStream::connect(server.addr()).await.unwrap();
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");

    client.write_all(b"abc").await.unwrap();
    let received = server
        .wait_for_received(3, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(received, b"abc");

    // Close step: the peer sees EOF
    assert_eq!(client.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_wait_for_received_times_out() {
    let server = ScriptedServer::start(vec![Step::Expect(8)]).await.unwrap();
    let _client = TcpStream::connect(server.addr()).await.unwrap();

    let err = server
        .wait_for_received(8, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScriptedServerError::Timeout {
            expected: 8,
            received: 0
        }
    ));
}
