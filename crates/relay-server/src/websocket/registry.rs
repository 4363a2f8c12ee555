//! Identity → connection map.
//!
//! The registry onboards sockets, routes directed sends, fans out
//! broadcasts, and closes everything on shutdown. The map lock is never
//! held across a queue operation: callers snapshot the target `Arc`s first
//! and release the lock before awaiting.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::SinkExt;
use futures::future::join_all;
use metrics::{counter, gauge};
use relay_core::{ConnectionId, Frame, RelayError, Result};
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::transport::{FrameSink, FrameStream};
use crate::config::RelayConfig;
use crate::metrics::{
    CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL, ONBOARD_FAILURES_TOTAL,
};

/// Live connections keyed by identity.
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Lock-free mirror of `connections.len()`.
    active_count: AtomicUsize,
    config: RelayConfig,
    tracker: TaskTracker,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Connection tuning applied to onboarded sockets.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Build an open, unregistered connection bound to this registry.
    pub fn new_connection(self: &Arc<Self>, id: ConnectionId) -> Arc<Connection> {
        Arc::new(Connection::new(
            id,
            Arc::downgrade(self),
            self.config.inbound_capacity,
            self.config.outbound_capacity,
        ))
    }

    /// Insert a connection.
    ///
    /// Fails with [`RelayError::DuplicateIdentity`] if the identity is
    /// already present (the existing entry is kept), or
    /// [`RelayError::Closed`] if the connection has already closed.
    pub async fn register(&self, connection: Arc<Connection>) -> Result<()> {
        let mut conns = self.connections.write().await;
        // Checked under the write lock: a close that lands after this point
        // blocks on the same lock in `remove_connection` and evicts the entry.
        if connection.is_closed() {
            return Err(RelayError::Closed);
        }
        match conns.entry(connection.id().clone()) {
            Entry::Occupied(slot) => {
                error!(conn_id = %slot.key(), "identity collision, rejecting connection");
                Err(RelayError::DuplicateIdentity(slot.key().clone()))
            }
            Entry::Vacant(slot) => {
                let _ = slot.insert(connection);
                let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
                counter!(CONNECTIONS_TOTAL).increment(1);
                gauge!(CONNECTIONS_ACTIVE).increment(1.0);
                Ok(())
            }
        }
    }

    /// Remove an identity. Absent identities are a no-op.
    ///
    /// Returns whether an entry was removed.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.connections.write().await.remove(id).is_some();
        if removed {
            self.record_removal(id);
        }
        removed
    }

    /// Remove `connection` only if it is the entry registered under its id.
    ///
    /// A connection rejected as a duplicate never evicts the live holder of
    /// the same identity. Returns whether an entry was removed.
    pub async fn remove_connection(&self, connection: &Connection) -> bool {
        let id = connection.id();
        let removed = {
            let mut conns = self.connections.write().await;
            match conns.entry(id.clone()) {
                Entry::Occupied(slot) if std::ptr::eq(Arc::as_ptr(slot.get()), connection) => {
                    let _ = slot.remove();
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.record_removal(id);
        }
        removed
    }

    fn record_removal(&self, id: &str) {
        let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        counter!(DISCONNECTIONS_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
        debug!(conn_id = id, "connection unregistered");
    }

    /// Look up a connection.
    pub async fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Queue `frame` on the target's outbound queue.
    ///
    /// Fails with [`RelayError::NoSuchConnection`] if the identity is not
    /// registered and [`RelayError::Closed`] if the target closes before the
    /// frame is queued.
    pub async fn send_to(&self, id: &str, frame: Frame) -> Result<()> {
        let target = self.get(id).await;
        match target {
            Some(conn) => conn.enqueue_outbound(frame).await,
            None => Err(RelayError::NoSuchConnection(id.to_owned())),
        }
    }

    /// Queue `frame` on every connection except `exclude`.
    ///
    /// Returns the number of connections that accepted it. Targets that
    /// close mid-broadcast are skipped.
    pub async fn broadcast(&self, exclude: &str, frame: &Frame) -> usize {
        let targets: Vec<Arc<Connection>> = {
            let conns = self.connections.read().await;
            conns
                .iter()
                .filter(|(id, _)| id.as_str() != exclude)
                .map(|(_, c)| Arc::clone(c))
                .collect()
        };
        let results = join_all(
            targets
                .iter()
                .map(|c| c.enqueue_outbound(frame.clone())),
        )
        .await;
        let delivered = results.iter().filter(|r| r.is_ok()).count();
        debug!(exclude, recipients = targets.len(), delivered, "broadcast");
        delivered
    }

    /// Identities of all connections except `exclude`, sorted.
    pub async fn list_others(&self, exclude: &str) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections
            .read()
            .await
            .keys()
            .filter(|id| id.as_str() != exclude)
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// All registered identities, sorted.
    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.list_others("").await
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Onboard a socket: assign an identity, register, and start its tasks.
    ///
    /// On failure the sink is closed and nothing is registered.
    pub async fn accept(
        self: &Arc<Self>,
        sink: FrameSink,
        stream: FrameStream,
    ) -> Result<ConnectionId> {
        let connection = match ConnectionId::generate(self.config.identity_len) {
            Ok(id) => self.new_connection(id),
            Err(e) => {
                error!(error = %e, "identity generation failed");
                return Err(self.reject(sink, e.into()).await);
            }
        };
        if let Err(e) = self.register(Arc::clone(&connection)).await {
            return Err(self.reject(sink, e).await);
        }

        connection.start(sink, stream, self.config.heartbeat_interval(), &self.tracker);
        info!(
            conn_id = %connection.id(),
            active = self.connection_count(),
            "connection onboarded"
        );
        Ok(connection.id().clone())
    }

    async fn reject(&self, mut sink: FrameSink, err: RelayError) -> RelayError {
        counter!(ONBOARD_FAILURES_TOTAL).increment(1);
        if let Err(close_err) = sink.close().await {
            debug!(error = %close_err, "failed to close rejected socket");
        }
        err
    }

    /// Close every registered connection.
    ///
    /// Returns once each has been closed and removed. Connections onboarded
    /// concurrently with this call may survive it.
    pub async fn shutdown(&self) {
        let snapshot: Vec<Arc<Connection>> =
            self.connections.read().await.values().cloned().collect();
        info!(count = snapshot.len(), "closing all connections");
        let _ = join_all(snapshot.iter().map(|c| c.close())).await;
    }

    /// Wait for every connection task to finish.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let _ = self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                remaining = self.tracker.len(),
                "connection tasks still running after drain timeout"
            );
        }
        drained
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.connection_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
