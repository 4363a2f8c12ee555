//! # relay-server
//!
//! Axum HTTP + `WebSocket` relay server.
//!
//! - `WebSocket` gateway: identity assignment, per-connection pumps,
//!   heartbeat, and message dispatch
//! - [`websocket::registry::Registry`]: identity → connection map with
//!   directed send, broadcast, and shutdown
//! - HTTP endpoints: `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
