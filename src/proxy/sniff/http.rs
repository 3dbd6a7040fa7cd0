//! HTTP Host-header sniffing (port 80).

use tokio::io::AsyncRead;

use super::{read_more, SniffError, SniffedHeader};
use crate::config::SniffConfig;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Read an HTTP/1.x request until the end of its headers and extract the
/// `Host` value.
///
/// Accumulates into a single bounded buffer with a fresh deadline per read.
/// The returned [`SniffedHeader`] carries every byte read so far, including
/// any request body bytes that arrived with the headers.
pub async fn sniff_http<R: AsyncRead + Unpin>(
    stream: &mut R,
    config: &SniffConfig,
) -> Result<SniffedHeader, SniffError> {
    let mut buf = vec![0u8; config.max_bytes];
    let mut filled = 0;

    let header_end = loop {
        filled = read_more(stream, &mut buf, filled, config.read_timeout).await?;
        if let Some(pos) = find_terminator(&buf[..filled]) {
            break pos;
        }
    };

    let domain = host_value(&buf[..header_end])?;
    buf.truncate(filled);
    SniffedHeader::new(domain, buf)
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// Locate the `Host:` header line (case-insensitive) and return its value,
/// trimmed and with any `:port` suffix removed.
fn host_value(headers: &[u8]) -> Result<String, SniffError> {
    for line in headers.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() < 5 || !line[..5].eq_ignore_ascii_case(b"host:") {
            continue;
        }

        let value = std::str::from_utf8(&line[5..])
            .map_err(|_| SniffError::Malformed("Host value is not valid UTF-8"))?
            .trim();
        return Ok(strip_port(value).to_string());
    }

    Err(SniffError::MissingHost)
}

/// Drop a `:port` suffix from a host token. Bracketed IPv6 literals keep
/// their brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.find(':') {
            Some(colon) => &host[..colon],
            None => host,
        }
    }
}
