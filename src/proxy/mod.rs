//! The connection pipeline: sniff → dial → relay.
//!
//! ```text
//! Client -> Listener -> Sniffer (Host / SNI) -> Dialer -> Relay -> Upstream
//! ```

mod listener;
mod relay;
pub mod sniff;
mod upstream;

pub use listener::Listener;
pub use relay::{relay, RelayOutcome};
pub use sniff::{sniff_http, sniff_tls, SniffError, SniffedHeader};
pub use upstream::dial;
