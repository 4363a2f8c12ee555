//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// Fails if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Build a recorder handle without installing it globally.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// ── Connection metrics ──────────────────────────────────────────────

/// Total connections registered.
pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Total connections removed from the registry.
pub const DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Currently registered connections.
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Onboarding attempts rejected (entropy or identity collision).
pub const ONBOARD_FAILURES_TOTAL: &str = "relay_onboard_failures_total";

// ── Routing metrics ─────────────────────────────────────────────────

/// Messages delivered to a target's outbound queue.
pub const MESSAGES_ROUTED_TOTAL: &str = "relay_messages_routed_total";
/// Directed sends that found no open target.
pub const ROUTE_FAILURES_TOTAL: &str = "relay_route_failures_total";
/// Inbound frames that failed to decode or validate.
pub const DECODE_ERRORS_TOTAL: &str = "relay_decode_errors_total";

// ── Heartbeat metrics ───────────────────────────────────────────────

/// Heartbeat frames queued.
pub const HEARTBEATS_TOTAL: &str = "relay_heartbeats_total";
