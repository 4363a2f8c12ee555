//! # relayd
//!
//! Relay server binary: loads settings, installs logging and metrics, and
//! serves the `WebSocket` relay until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::logging;
use relay_server::config::ServerConfig;
use relay_server::server::RelayServer;
use relay_settings::{LogFormat, RelaySettings};
use tracing::{info, warn};

/// Budget for draining connection tasks and the listener after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Real-time message relay.
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about = "Real-time message relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Heartbeat period in milliseconds (overrides settings).
    #[arg(long)]
    heartbeat_ms: Option<u64>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(ms) = self.heartbeat_ms {
            settings.relay.heartbeat_interval_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .settings
        .clone()
        .unwrap_or_else(relay_settings::settings_path);
    let mut settings = relay_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid command-line override")?;

    match settings.logging.format {
        LogFormat::Compact => logging::init_subscriber(&settings.logging.level),
        LogFormat::Json => logging::init_json_subscriber(&settings.logging.level),
    }

    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = Arc::new(RelayServer::new(
        ServerConfig::from_settings(&settings),
        metrics,
    ));
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    info!(
        version = relay_core::constants::VERSION,
        %addr,
        ws_path = %server.config().ws_path,
        "relayd started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    let report = server
        .shutdown()
        .graceful_shutdown(handle, Some(SHUTDOWN_TIMEOUT))
        .await;
    if !report.is_clean() {
        warn!(?report, "relay tasks still running at exit");
    }
    info!("relayd stopped");
    Ok(())
}
