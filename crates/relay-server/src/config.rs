//! Server configuration.

use std::time::Duration;

use relay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

use crate::websocket::heartbeat::MIN_HEARTBEAT_INTERVAL;

/// Per-connection tuning shared by every connection a registry onboards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Random bytes per identity (hex-encoded to twice this length).
    pub identity_len: usize,
    /// Inbound queue capacity.
    pub inbound_capacity: usize,
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
    /// Heartbeat period in milliseconds.
    pub heartbeat_interval_ms: u64,
}

impl RelayConfig {
    /// Heartbeat period as a `Duration`, never below
    /// [`MIN_HEARTBEAT_INTERVAL`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms).max(MIN_HEARTBEAT_INTERVAL)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            identity_len: settings.relay.identity_len,
            inbound_capacity: settings.relay.inbound_capacity,
            outbound_capacity: settings.relay.outbound_capacity,
            heartbeat_interval_ms: settings.relay.heartbeat_interval_ms,
        }
    }
}

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 for OS-assigned).
    pub port: u16,
    /// Route the `WebSocket` upgrade is served on.
    pub ws_path: String,
    /// Connection tuning.
    pub relay: RelayConfig,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            ws_path: settings.server.ws_path.clone(),
            relay: RelayConfig::from(settings),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&RelaySettings::default())
    }
}
