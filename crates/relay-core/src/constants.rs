//! Protocol and runtime constants.

/// Current version of the relay (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of random bytes behind each connection identity.
pub const IDENTITY_LEN: usize = 10;

/// Default capacity of a connection's inbound queue.
pub const INBOUND_QUEUE_CAPACITY: usize = 1000;

/// Default capacity of a connection's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1000;

/// Default heartbeat interval in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 2000;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 7777;

/// Default WebSocket route.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Prefix of a heartbeat sent when no peers are connected.
pub const HEARTBEAT_PREFIX: &str = "[HEARTBEAT]";

/// Body of a heartbeat sent when no peers are connected.
pub const HEARTBEAT_BODY: &str = "heartbeat from server";

/// Prefix of a heartbeat listing the other connected identities.
pub const ACTIVE_PREFIX: &str = "[ACTIVE]";

/// Prefix of a routed message delivered to its target.
pub const RESPONSE_PREFIX: &str = "[RESPONSE]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
        for part in parts {
            let _: u32 = part.parse().expect("each semver segment must be a number");
        }
    }

    #[test]
    fn queue_capacities_match() {
        assert_eq!(INBOUND_QUEUE_CAPACITY, 1000);
        assert_eq!(OUTBOUND_QUEUE_CAPACITY, 1000);
    }

    #[test]
    fn ws_path_is_absolute() {
        assert!(DEFAULT_WS_PATH.starts_with('/'));
    }
}
