//! Listener and sniffing configuration.

use std::net::IpAddr;
use std::time::Duration;

/// Default bind address for both listeners.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Port for plain-HTTP connections (Host header sniffing).
pub const HTTP_PORT: u16 = 80;

/// Port for TLS connections (ClientHello SNI sniffing).
pub const TLS_PORT: u16 = 443;

/// Deadline applied to each individual read while sniffing.
pub const SNIFF_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum bytes buffered while sniffing (16 KiB).
pub const SNIFF_BUFFER_CAPACITY: usize = 16 * 1024;

/// Timeout for the upstream dial.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline used to unblock the surviving relay direction once its
/// peer direction has finished.
pub const RELAY_LINGER: Duration = Duration::from_secs(5);

/// Copy buffer size per relay direction.
pub const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Which header sniffer a listener runs on accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffProtocol {
    /// HTTP/1.x `Host:` header.
    Http,
    /// TLS ClientHello server_name extension.
    Tls,
}

/// Bounds on the sniffing read loop.
#[derive(Debug, Clone)]
pub struct SniffConfig {
    /// Deadline per read attempt.
    pub read_timeout: Duration,
    /// Maximum bytes to accumulate before giving up.
    pub max_bytes: usize,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            read_timeout: SNIFF_READ_TIMEOUT,
            max_bytes: SNIFF_BUFFER_CAPACITY,
        }
    }
}

/// Configuration for one listener. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind to.
    pub bind: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Sniffer variant for this port.
    pub protocol: SniffProtocol,
    /// Port to dial upstream. `None` means the listener port — the relay
    /// never changes port in production; tests point this at ephemeral
    /// backend ports.
    pub dial_port: Option<u16>,
    /// Sniffing bounds.
    pub sniff: SniffConfig,
    /// Upstream dial timeout.
    pub dial_timeout: Duration,
    /// Relay unblock deadline.
    pub linger: Duration,
}

impl ListenerConfig {
    /// Create a listener configuration with default timeouts.
    pub fn new(bind: IpAddr, port: u16, protocol: SniffProtocol) -> Self {
        Self {
            bind,
            port,
            protocol,
            dial_port: None,
            sniff: SniffConfig::default(),
            dial_timeout: DIAL_TIMEOUT,
            linger: RELAY_LINGER,
        }
    }

    /// The port upstream connections are dialed on.
    pub fn dial_port(&self) -> u16 {
        self.dial_port.unwrap_or(self.port)
    }
}
