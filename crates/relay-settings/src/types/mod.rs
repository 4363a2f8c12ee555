//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may specify any subset of fields.

use relay_core::constants::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WS_PATH, HEARTBEAT_INTERVAL_MS, IDENTITY_LEN,
    INBOUND_QUEUE_CAPACITY, OUTBOUND_QUEUE_CAPACITY,
};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "relay": { "heartbeatIntervalMs": 5000 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection relay settings.
    pub relay: RelayTuning,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.relay.identity_len == 0 {
            return Err(SettingsError::invalid("relay.identityLen", "must be non-zero"));
        }
        if self.relay.inbound_capacity == 0 {
            return Err(SettingsError::invalid(
                "relay.inboundCapacity",
                "must be non-zero",
            ));
        }
        if self.relay.outbound_capacity == 0 {
            return Err(SettingsError::invalid(
                "relay.outboundCapacity",
                "must be non-zero",
            ));
        }
        if self.relay.heartbeat_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "relay.heartbeatIntervalMs",
                "must be non-zero",
            ));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(SettingsError::invalid(
                "server.wsPath",
                format!("must start with '/', got {:?}", self.server.ws_path),
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
    /// Route serving the WebSocket upgrade.
    pub ws_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
        }
    }
}

/// Per-connection queue, identity, and heartbeat tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayTuning {
    /// Random bytes per connection identity.
    pub identity_len: usize,
    /// Inbound queue capacity.
    pub inbound_capacity: usize,
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
}

impl Default for RelayTuning {
    fn default() -> Self {
        Self {
            identity_len: IDENTITY_LEN,
            inbound_capacity: INBOUND_QUEUE_CAPACITY,
            outbound_capacity: OUTBOUND_QUEUE_CAPACITY,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RelaySettings::default().validate().is_ok());
    }

    #[test]
    fn zero_identity_len_invalid() {
        let mut s = RelaySettings::default();
        s.relay.identity_len = 0;
        assert_eq!(s.validate().unwrap_err().field(), Some("relay.identityLen"));
    }

    #[test]
    fn zero_capacity_invalid() {
        let mut s = RelaySettings::default();
        s.relay.outbound_capacity = 0;
        assert_eq!(
            s.validate().unwrap_err().field(),
            Some("relay.outboundCapacity")
        );
    }

    #[test]
    fn zero_heartbeat_invalid() {
        let mut s = RelaySettings::default();
        s.relay.heartbeat_interval_ms = 0;
        assert_eq!(
            s.validate().unwrap_err().field(),
            Some("relay.heartbeatIntervalMs")
        );
    }

    #[test]
    fn relative_ws_path_invalid() {
        let mut s = RelaySettings::default();
        s.server.ws_path = "ws".into();
        let err = s.validate().unwrap_err();
        assert_eq!(err.field(), Some("server.wsPath"));
        assert!(err.to_string().contains("\"ws\""));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert_eq!(json["server"]["wsPath"], "/ws");
        assert_eq!(json["relay"]["heartbeatIntervalMs"], 2000);
        assert_eq!(json["relay"]["inboundCapacity"], 1000);
        assert_eq!(json["logging"]["format"], "compact");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RelaySettings = serde_json::from_str(r#"{"relay":{"identityLen":4}}"#).unwrap();
        assert_eq!(s.relay.identity_len, 4);
        assert_eq!(s.relay.outbound_capacity, 1000);
        assert_eq!(s.server.port, 7777);
    }

    #[test]
    fn log_format_json() {
        let s: LoggingSettings = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(s.format, LogFormat::Json);
        assert_eq!(s.level, "info");
    }
}
