//! hostrelay
//!
//! Domain-aware transparent TCP relay. Accepts connections on ports 80 and
//! 443, sniffs the destination hostname from the first bytes of the stream
//! (HTTP `Host` header or TLS ClientHello SNI), dials that host on the same
//! port, replays the sniffed bytes, and relays bidirectionally until both
//! directions finish.

pub mod config;
pub mod proxy;

pub use config::{ListenerConfig, SniffConfig, SniffProtocol};
pub use proxy::{dial, relay, Listener, RelayOutcome, SniffError, SniffedHeader};
