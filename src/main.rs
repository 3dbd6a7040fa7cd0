//! hostrelay
//!
//! Transparent TCP relay that routes by sniffed hostname:
//! - port 80: HTTP `Host` header
//! - port 443: TLS ClientHello SNI
//!
//! Dials the sniffed host on the same port and relays bytes verbatim.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hostrelay::config::{ListenerConfig, DEFAULT_BIND_ADDR, HTTP_PORT, TLS_PORT};
use hostrelay::proxy::Listener;
use hostrelay::SniffProtocol;

#[derive(Debug, Parser)]
#[command(name = "hostrelay", about = "Domain-aware transparent TCP relay")]
struct Cli {
    /// Address to bind both listeners to.
    #[arg(short = 'b', long = "bind", env = "HOSTRELAY_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: IpAddr,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", env = "HOSTRELAY_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (prefer RUST_LOG, fallback to --log-level)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(bind = %cli.bind, "Starting hostrelay");

    let listeners = [
        ListenerConfig::new(cli.bind, HTTP_PORT, SniffProtocol::Http),
        ListenerConfig::new(cli.bind, TLS_PORT, SniffProtocol::Tls),
    ];

    for config in listeners {
        let bind_addr = (config.bind, config.port);
        let listener = Listener::bind(config)
            .await
            .with_context(|| format!("failed to bind {}:{}", bind_addr.0, bind_addr.1))?;
        let listener = Arc::new(listener);
        tokio::spawn(async move {
            if let Err(e) = listener.run().await {
                error!(error = %e, "Listener error");
            }
        });
    }

    // No graceful drain: in-flight connections end when the process does.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, exiting"),
        _ = sigint.recv() => info!("Received SIGINT, exiting"),
    }

    Ok(())
}
