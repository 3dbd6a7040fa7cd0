
use std::time::Duration;

use harness::{client_hello, spawn_listener, EchoBackend};
use hostrelay::SniffProtocol;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn proxies_client_hello_and_following_bytes() {
    let backend = EchoBackend::spawn().await.unwrap();
    let proxy = spawn_listener(SniffProtocol::Tls, backend.addr.port())
        .await
        .unwrap();

    let hello = client_hello("127.0.0.1");

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(&hello).await.unwrap();
    client.write_all(b"post-hello data").await.unwrap();
    client.shutdown().await.unwrap();

    let mut echoed = Vec::new();
    timeout(TEST_TIMEOUT, client.read_to_end(&mut echoed))
        .await
        .unwrap()
        .unwrap();

    let mut expected = hello.clone();
    expected.extend_from_slice(b"post-hello data");
    assert_eq!(echoed, expected);
    assert_eq!(backend.received().await, expected);
    assert_eq!(backend.connection_count(), 1);
}

#[tokio::test]
async fn fragmented_client_hello_is_reassembled() {
    let backend = EchoBackend::spawn().await.unwrap();
    let proxy = spawn_listener(SniffProtocol::Tls, backend.addr.port())
        .await
        .unwrap();

    let hello = client_hello("127.0.0.1");

    let mut client = TcpStream::connect(proxy).await.unwrap();
    for chunk in hello.chunks(7) {
        client.write_all(chunk).await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    client.shutdown().await.unwrap();

    let mut echoed = Vec::new();
    timeout(TEST_TIMEOUT, client.read_to_end(&mut echoed))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(echoed, hello);
    assert_eq!(backend.received().await, hello);
}

#[tokio::test]
async fn non_tls_bytes_close_without_dialing() {
    let backend = EchoBackend::spawn().await.unwrap();
    let proxy = spawn_listener(SniffProtocol::Tls, backend.addr.port())
        .await
        .unwrap();

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n")
        .await
        .unwrap();

    let mut got = Vec::new();
    let _ = timeout(TEST_TIMEOUT, client.read_to_end(&mut got))
        .await
        .unwrap();
    assert!(got.is_empty());
    assert_eq!(backend.connection_count(), 0);
}

#[tokio::test]
async fn non_client_hello_handshake_closes_without_dialing() {
    let backend = EchoBackend::spawn().await.unwrap();
    let proxy = spawn_listener(SniffProtocol::Tls, backend.addr.port())
        .await
        .unwrap();

    // A handshake record carrying a ServerHello (type 2).
    let record = [0x16, 0x03, 0x01, 0x00, 0x04, 0x02, 0x00, 0x00, 0x00];

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(&record).await.unwrap();

    let mut got = Vec::new();
    let _ = timeout(TEST_TIMEOUT, client.read_to_end(&mut got))
        .await
        .unwrap();
    assert!(got.is_empty());
    assert_eq!(backend.connection_count(), 0);
}
