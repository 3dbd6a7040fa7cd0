//! TCP listener and per-connection handling.
//!
//! One listener per port. Each accepted connection gets its own task that
//! runs sniff → dial → replay sniffed bytes → relay, closing both streams
//! on every exit path.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn, Instrument};

use super::relay::relay;
use super::sniff::{sniff_http, sniff_tls, SniffedHeader};
use super::upstream;
use crate::config::{ListenerConfig, SniffProtocol};

/// A sniffing TCP listener bound to one port.
pub struct Listener {
    config: ListenerConfig,
    listener: TcpListener,
}

impl Listener {
    /// Bind the configured address and port.
    pub async fn bind(config: ListenerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.bind, config.port)).await?;
        info!(
            bind_addr = %listener.local_addr()?,
            protocol = ?config.protocol,
            "Listener bound"
        );
        Ok(Self { config, listener })
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, handling each in its own task.
    ///
    /// Accept errors are transient: they are logged and the loop continues
    /// after a short sleep.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        info!(bind_addr = %self.listener.local_addr()?, "Listener started");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let listener = Arc::clone(&self);
                    tokio::spawn(
                        async move {
                            listener.handle_connection(stream, peer_addr).await;
                        }
                        .instrument(tracing::info_span!("connection", peer = %peer_addr)),
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Accept error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Sniff the destination, dial it, replay the sniffed bytes, relay.
    ///
    /// Every failure is terminal for this connection: it is logged and both
    /// streams drop closed. Nothing is retried.
    async fn handle_connection(&self, mut client: TcpStream, peer_addr: SocketAddr) {
        let sniffed = match self.sniff(&mut client).await {
            Ok(sniffed) => sniffed,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "Cannot sniff destination, closing");
                return;
            }
        };

        let port = self.config.dial_port();
        let mut upstream = match upstream::dial(&sniffed.domain, port, self.config.dial_timeout).await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(
                    peer = %peer_addr,
                    upstream = %format_args!("{}:{}", sniffed.domain, port),
                    error = %e,
                    "Failed to connect upstream, closing"
                );
                return;
            }
        };

        // The upstream must see everything the client already sent.
        if let Err(e) = upstream.write_all(&sniffed.consumed).await {
            warn!(
                peer = %peer_addr,
                upstream = %format_args!("{}:{}", sniffed.domain, port),
                error = %e,
                "Failed to replay sniffed bytes, closing"
            );
            return;
        }

        info!(
            peer = %peer_addr,
            upstream = %format_args!("{}:{}", sniffed.domain, port),
            sniffed_bytes = sniffed.consumed.len(),
            "Proxying"
        );

        match relay(client, upstream, self.config.linger).await {
            Ok(outcome) => debug!(
                to_upstream = outcome.to_upstream,
                from_upstream = outcome.from_upstream,
                "Connection closed"
            ),
            Err(e) => warn!(
                peer = %peer_addr,
                upstream = %format_args!("{}:{}", sniffed.domain, port),
                error = %e,
                "Relay error"
            ),
        }
    }

    async fn sniff(&self, client: &mut TcpStream) -> Result<SniffedHeader, super::sniff::SniffError> {
        match self.config.protocol {
            SniffProtocol::Http => sniff_http(client, &self.config.sniff).await,
            SniffProtocol::Tls => sniff_tls(client, &self.config.sniff).await,
        }
    }
}
