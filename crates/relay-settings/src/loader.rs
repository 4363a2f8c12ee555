//! Settings loading with environment variable overrides.
//!
//! Loading flow:
//! 1. Parse the settings file into [`RelaySettings`]; keys it omits keep
//!    their compiled defaults. A missing file means all defaults.
//! 2. Apply `RELAY_*` environment overrides
//! 3. Validate the result

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, RelaySettings};

/// Resolve the path to the settings file (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults; an unreadable or malformed file is
/// an error naming the path.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Read and parse one settings file, without overrides or validation.
pub fn read_settings_file(path: &Path) -> Result<RelaySettings> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(?path, "loading settings from file");
            parse_settings(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(?path, "settings file not found, using defaults");
            Ok(RelaySettings::default())
        }
        Err(source) => Err(SettingsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse settings JSON. Omitted sections and keys take their defaults.
pub fn parse_settings(content: &str) -> serde_json::Result<RelaySettings> {
    serde_json::from_str(content)
}

/// Apply `RELAY_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, leaving the file/default value.
pub fn apply_overrides_from(
    settings: &mut RelaySettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        parsed
    };

    if let Some(v) = string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = ranged("RELAY_PORT", 0, u64::from(u16::MAX)) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = string("RELAY_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = ranged("RELAY_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.relay.heartbeat_interval_ms = v;
    }
    if let Some(v) = ranged("RELAY_INBOUND_CAPACITY", 1, 1_000_000) {
        settings.relay.inbound_capacity =
            usize::try_from(v).unwrap_or(settings.relay.inbound_capacity);
    }
    if let Some(v) = ranged("RELAY_OUTBOUND_CAPACITY", 1, 1_000_000) {
        settings.relay.outbound_capacity =
            usize::try_from(v).unwrap_or(settings.relay.outbound_capacity);
    }
    if let Some(v) = string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("RELAY_LOG_FORMAT") {
        match serde_json::from_value::<LogFormat>(serde_json::Value::String(v.clone())) {
            Ok(format) => settings.logging.format = format,
            Err(_) => warn!(key = "RELAY_LOG_FORMAT", value = %v, "unknown log format, ignoring"),
        }
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
