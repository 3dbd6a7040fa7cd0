//! Bidirectional relay between two established streams.
//!
//! Two directional copy loops run concurrently. Neither direction knows
//! when the other will finish, so a direction that completes (EOF or error)
//! flips a watch flag; the surviving direction then reads under a short
//! linger deadline and treats the deadline firing as completion. Without
//! this, a relay that finishes one direction first would park forever in a
//! blocking read on the quiet side.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::COPY_BUFFER_SIZE;

/// Bytes moved in each direction by a completed relay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes copied client → upstream.
    pub to_upstream: u64,
    /// Bytes copied upstream → client.
    pub from_upstream: u64,
}

/// Copy bytes both ways between `client` and `upstream` until both
/// directions finish.
///
/// Returns the first real error from either direction. A linger-deadline
/// timeout used to unblock the surviving direction is completion, not an
/// error, and never appears in the result.
pub async fn relay<C, U>(client: C, upstream: U, linger: Duration) -> io::Result<RelayOutcome>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);

    // Each direction announces its completion on its own channel and
    // watches the peer's.
    let (up_done_tx, up_done_rx) = watch::channel(false);
    let (down_done_tx, down_done_rx) = watch::channel(false);

    let up = copy_direction(client_read, upstream_write, down_done_rx, up_done_tx, linger);
    let down = copy_direction(upstream_read, client_write, up_done_rx, down_done_tx, linger);

    let (to_upstream, from_upstream) = tokio::join!(up, down);
    Ok(RelayOutcome {
        to_upstream: to_upstream?,
        from_upstream: from_upstream?,
    })
}

/// One copy direction: read from `src`, write to `dst`, until EOF, error,
/// or (once the peer direction is done) the linger deadline.
async fn copy_direction<R, W>(
    mut src: R,
    mut dst: W,
    mut peer_done: watch::Receiver<bool>,
    done: watch::Sender<bool>,
    linger: Duration,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    let result = loop {
        let read = if *peer_done.borrow() {
            // Peer finished; nothing more arriving within the linger
            // window means this direction is done too.
            match timeout(linger, src.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => break Ok(total),
            }
        } else {
            tokio::select! {
                read = src.read(&mut buf) => read,
                _ = peer_done.changed() => continue,
            }
        };

        match read {
            Ok(0) => break Ok(total),
            Ok(n) => {
                if let Err(e) = dst.write_all(&buf[..n]).await {
                    break Err(e);
                }
                total += n as u64;
            }
            Err(e) => break Err(e),
        }
    };

    // Unblock the peer direction, then half-close our sink so the far end
    // sees EOF. The send precedes the shutdown so the peer never misses it.
    let _ = done.send(true);
    let _ = dst.shutdown().await;

    result
}
