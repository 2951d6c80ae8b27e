//! Relay daemon entry point.
//!
//! Wires configuration, the browser supervisor, the stream hub, and the
//! HTTP server together, then runs until ctrl-c.

#![deny(unsafe_code)]

use anyhow::Context as _;
use clap::Parser;
use peek_browser::NoopDriver;
use peek_browser::supervisor::reap_orphans;
use peek_server::{RelayConfig, RelayServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Browser session relay: one headless Chrome per task, live SSE
/// screencast streams, and frame replay.
#[derive(Parser, Debug)]
#[command(name = "peek-relay", version)]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 auto-assigns).
    #[arg(long)]
    port: Option<u16>,

    /// Directory frames are persisted under.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Chrome binary to use instead of discovery.
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// First browser debug port to probe.
    #[arg(long)]
    start_port: Option<u16>,

    /// Number of debug ports to probe.
    #[arg(long)]
    port_range: Option<u16>,

    /// Seconds without a frame before an SSE keepalive.
    #[arg(long)]
    keepalive_secs: Option<u64>,

    /// Skip the startup sweep of leftover debug browsers.
    #[arg(long)]
    no_reap: bool,
}

/// Defaults, then environment overrides, then CLI flags.
fn build_config(cli: &Cli) -> RelayConfig {
    let mut config = RelayConfig::default().apply_env_overrides();
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = &cli.frames_dir {
        config.frames_dir.clone_from(dir);
    }
    if let Some(path) = &cli.chrome_path {
        config.chrome_path = Some(path.clone());
    }
    if let Some(port) = cli.start_port {
        config.start_port = port;
    }
    if let Some(range) = cli.port_range {
        config.port_range = range;
    }
    if let Some(secs) = cli.keepalive_secs {
        config.keepalive_secs = secs;
    }
    if cli.no_reap {
        config.reap_orphans = false;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli);

    if config.reap_orphans {
        let reaped = reap_orphans().await;
        if reaped > 0 {
            info!(reaped, "cleaned up leftover debug browsers");
        }
    }

    let metrics_handle = peek_server::metrics::install_recorder();
    let server = RelayServer::new(config)
        .with_metrics(metrics_handle)
        .with_driver(Arc::new(NoopDriver));

    let (addr, serve_handle) = server.listen().await.context("failed to bind server")?;
    info!(%addr, "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    server
        .coordinator()
        .graceful_shutdown(vec![serve_handle], Some(Duration::from_secs(10)))
        .await;
    info!("goodbye");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
