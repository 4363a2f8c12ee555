//! `WebSocket` connection lifecycle, heartbeat, message dispatch, and the
//! connection registry.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `transport` | Frame sink/stream types, Axum socket adapter |
//! | `connection` | Queues, close protocol, read/write pumps |
//! | `dispatch` | Decodes inbound frames and routes them through the registry |
//! | `heartbeat` | Periodic liveness / peer-list frames |
//! | `registry` | Identity → connection map, onboarding, send, broadcast, shutdown |
//!
//! ## Data Flow
//!
//! socket → read pump → inbound queue → `dispatch` → `registry.send_to` →
//! target's outbound queue → target's write pump → socket.

pub mod connection;
pub mod dispatch;
pub mod heartbeat;
pub mod registry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;
