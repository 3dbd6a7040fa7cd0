//! TLS ClientHello SNI sniffing (port 443).
//!
//! Wire layout parsed here:
//!
//! ```text
//! 1   record content type (22 = Handshake)
//! 2   record version
//! 2   record length
//! --------------
//! 1   handshake type (1 = ClientHello)
//! 3   handshake length
//! 2   client version
//! 32  random
//! 1+  session ID (length-prefixed)
//! 2+  cipher suites (length-prefixed)
//! 1+  compression methods (length-prefixed)
//! 2+  extensions (length-prefixed)
//!       per extension: 2 type, 2 length, payload
//!       server_name (type 0x0000): 2 list length, then entries of
//!       1 name type (0 = host_name), 2 name length, name bytes
//! ```

use tokio::io::AsyncRead;

use super::{read_more, SniffError, SniffedHeader};
use crate::config::SniffConfig;

const CONTENT_TYPE_HANDSHAKE: u8 = 22;
const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 1;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0;

const RECORD_HEADER_LEN: usize = 5;

/// Read a TLS ClientHello and extract the server_name (SNI) hostname.
///
/// The hello may arrive fragmented across any number of TCP segments; reads
/// continue under the per-read deadline until the first record is complete.
/// Anything that is not a Handshake/ClientHello, or a hello without SNI,
/// fails — the destination is never guessed.
pub async fn sniff_tls<R: AsyncRead + Unpin>(
    stream: &mut R,
    config: &SniffConfig,
) -> Result<SniffedHeader, SniffError> {
    let mut buf = vec![0u8; config.max_bytes];
    let mut filled = 0;

    // Record header first. Reject non-handshake traffic as soon as the
    // content type byte is in.
    while filled < RECORD_HEADER_LEN {
        filled = read_more(stream, &mut buf, filled, config.read_timeout).await?;
        if buf[0] != CONTENT_TYPE_HANDSHAKE {
            return Err(SniffError::NotHandshake(buf[0]));
        }
    }

    let record_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    let record_end = RECORD_HEADER_LEN + record_len;
    if record_end > config.max_bytes {
        return Err(SniffError::HeaderTooLarge(config.max_bytes));
    }

    // Pull the rest of the record, failing fast on the handshake type.
    while filled < record_end {
        filled = read_more(stream, &mut buf, filled, config.read_timeout).await?;
        if filled > RECORD_HEADER_LEN && buf[RECORD_HEADER_LEN] != HANDSHAKE_TYPE_CLIENT_HELLO {
            return Err(SniffError::NotClientHello(buf[RECORD_HEADER_LEN]));
        }
    }

    let domain = parse_client_hello(&buf[RECORD_HEADER_LEN..record_end])?;
    buf.truncate(filled);
    SniffedHeader::new(domain, buf)
}

/// Parse the handshake message inside the first record and return the SNI
/// hostname, lowercased.
fn parse_client_hello(handshake: &[u8]) -> Result<String, SniffError> {
    if handshake.len() < 4 {
        return Err(SniffError::Malformed("record too short for a handshake"));
    }
    if handshake[0] != HANDSHAKE_TYPE_CLIENT_HELLO {
        return Err(SniffError::NotClientHello(handshake[0]));
    }

    let body_len = ((handshake[1] as usize) << 16)
        | ((handshake[2] as usize) << 8)
        | (handshake[3] as usize);
    let body = &handshake[4..];
    if body.len() < body_len {
        return Err(SniffError::Malformed("handshake truncated by record"));
    }
    let body = &body[..body_len];

    // 2 version + 32 random.
    let mut pos = 34;
    if body.len() < pos + 1 {
        return Err(SniffError::Malformed("hello fixed fields truncated"));
    }

    let session_id_len = body[pos] as usize;
    pos += 1 + session_id_len;

    if body.len() < pos + 2 {
        return Err(SniffError::Malformed("cipher suites truncated"));
    }
    let cipher_suites_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2 + cipher_suites_len;

    if body.len() < pos + 1 {
        return Err(SniffError::Malformed("compression methods truncated"));
    }
    let compression_len = body[pos] as usize;
    pos += 1 + compression_len;

    if body.len() < pos + 2 {
        // A ClientHello with no extensions block cannot name a server.
        return Err(SniffError::NoServerName);
    }
    let extensions_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
    pos += 2;

    let extensions_end = pos + extensions_len;
    if body.len() < extensions_end {
        return Err(SniffError::Malformed("extensions truncated"));
    }

    while pos + 4 <= extensions_end {
        let ext_type = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let ext_len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        pos += 4;
        if pos + ext_len > extensions_end {
            return Err(SniffError::Malformed("extension overruns block"));
        }

        if ext_type == EXTENSION_SERVER_NAME {
            return parse_server_name(&body[pos..pos + ext_len]);
        }
        pos += ext_len;
    }

    Err(SniffError::NoServerName)
}

fn parse_server_name(ext: &[u8]) -> Result<String, SniffError> {
    if ext.len() < 2 {
        return Err(SniffError::Malformed("server_name list truncated"));
    }
    let list_len = u16::from_be_bytes([ext[0], ext[1]]) as usize;
    if ext.len() < 2 + list_len || list_len < 3 {
        return Err(SniffError::Malformed("server_name list truncated"));
    }

    // First (and in practice only) entry.
    let entry = &ext[2..2 + list_len];
    if entry[0] != NAME_TYPE_HOST_NAME {
        return Err(SniffError::Malformed("server_name entry is not a host_name"));
    }
    let name_len = u16::from_be_bytes([entry[1], entry[2]]) as usize;
    if entry.len() < 3 + name_len {
        return Err(SniffError::Malformed("host_name truncated"));
    }

    let name = std::str::from_utf8(&entry[3..3 + name_len])
        .map_err(|_| SniffError::Malformed("host_name is not valid UTF-8"))?;
    Ok(name.to_lowercase())
}

#[cfg(test)]
pub(crate) fn build_client_hello(server_name: &str) -> Vec<u8> {
    let name = server_name.as_bytes();

    let mut sni_ext = Vec::new();
    sni_ext.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes()); // list length
    sni_ext.push(NAME_TYPE_HOST_NAME);
    sni_ext.extend_from_slice(&(name.len() as u16).to_be_bytes());
    sni_ext.extend_from_slice(name);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&EXTENSION_SERVER_NAME.to_be_bytes());
    extensions.extend_from_slice(&(sni_ext.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni_ext);
    // supported_versions, as a second extension the parser must skip over
    extensions.extend_from_slice(&[0x00, 0x2b, 0x00, 0x03, 0x02, 0x03, 0x04]);

    let mut body = Vec::new();
    body.extend_from_slice(&[0x03, 0x03]); // version
    body.extend_from_slice(&[0u8; 32]); // random
    body.push(0); // session ID length
    body.extend_from_slice(&[0x00, 0x02, 0x13, 0x01]); // one cipher suite
    body.extend_from_slice(&[0x01, 0x00]); // null compression
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = vec![HANDSHAKE_TYPE_CLIENT_HELLO];
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut record = vec![CONTENT_TYPE_HANDSHAKE, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}
