//! Hostname sniffing from the leading bytes of a client stream.
//!
//! Both sniffers read from the stream until they can extract the destination
//! hostname, and hand back everything they consumed so the connection handler
//! can replay it to the upstream. Sniffing never completes a handshake and
//! never writes to the client.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

mod http;
mod tls;

pub use http::sniff_http;
pub use tls::sniff_tls;

/// Why sniffing failed. All variants are terminal for the connection.
#[derive(Debug, Error)]
pub enum SniffError {
    #[error("read deadline exceeded while sniffing")]
    Timeout,

    #[error("header exceeds {0} byte buffer")]
    HeaderTooLarge(usize),

    #[error("no Host field in request headers")]
    MissingHost,

    #[error("TLS record type {0} is not a handshake")]
    NotHandshake(u8),

    #[error("handshake type {0} is not a ClientHello")]
    NotClientHello(u8),

    #[error("ClientHello has no server_name extension")]
    NoServerName,

    #[error("malformed header: {0}")]
    Malformed(&'static str),

    #[error("connection closed before a hostname could be read")]
    UnexpectedEof,

    #[error("read error while sniffing: {0}")]
    Io(#[from] io::Error),
}

/// A sniffed destination plus the exact bytes consumed reading it.
///
/// `consumed` must be forwarded to the upstream verbatim before relaying —
/// the upstream needs to see everything the client already sent.
#[derive(Debug)]
pub struct SniffedHeader {
    /// Destination hostname, non-empty and whitespace-trimmed.
    pub domain: String,
    /// All bytes read from the client so far.
    pub consumed: Vec<u8>,
}

impl SniffedHeader {
    fn new(domain: String, consumed: Vec<u8>) -> Result<Self, SniffError> {
        if domain.is_empty() {
            return Err(SniffError::Malformed("empty hostname"));
        }
        Ok(Self { domain, consumed })
    }
}

/// Read more bytes into `buf[filled..]` under the per-read deadline.
///
/// Returns the new fill level. A full buffer, a timeout, and EOF are all
/// sniff failures; none are retried.
async fn read_more<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
    filled: usize,
    read_timeout: Duration,
) -> Result<usize, SniffError> {
    if filled == buf.len() {
        return Err(SniffError::HeaderTooLarge(buf.len()));
    }

    let n = match timeout(read_timeout, stream.read(&mut buf[filled..])).await {
        Ok(result) => result?,
        Err(_) => return Err(SniffError::Timeout),
    };
    if n == 0 {
        return Err(SniffError::UnexpectedEof);
    }

    Ok(filled + n)
}
