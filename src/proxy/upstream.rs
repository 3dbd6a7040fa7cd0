//! Upstream dialing.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

/// Dial `domain:port` with a bounded connection timeout.
///
/// A timeout maps to [`io::ErrorKind::TimedOut`]. No retry, no fallback,
/// no caching across connections.
pub async fn dial(domain: &str, port: u16, dial_timeout: Duration) -> io::Result<TcpStream> {
    let addr = format!("{domain}:{port}");
    match timeout(dial_timeout, TcpStream::connect(&addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {addr} timed out"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn dials_a_listening_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = assert_ok!(dial("127.0.0.1", port, Duration::from_secs(2)).await);
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = dial("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.kind() == io::ErrorKind::ConnectionRefused || err.kind() == io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn unresolvable_domain_is_an_error() {
        let result = dial("host.invalid", 80, Duration::from_secs(2)).await;
        assert!(result.is_err());
    }
}
