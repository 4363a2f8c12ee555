//! Periodic heartbeat frames.
//!
//! Every interval the connection is sent either the fixed liveness text or,
//! when other connections exist, the comma-joined list of their identities.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use relay_core::heartbeat_frame;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::connection::Connection;
use crate::metrics::HEARTBEATS_TOTAL;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The connection closed while waiting for the next tick.
    Cancelled,
    /// The outbound queue rejected a heartbeat.
    EnqueueFailed,
}

/// Shortest interval the loop will tick at.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Queue a heartbeat every `interval` until the connection closes.
///
/// The first heartbeat goes out one full interval after start. Intervals
/// below [`MIN_HEARTBEAT_INTERVAL`] are raised to it. Ticks missed while the
/// outbound queue is full are not replayed: the next heartbeat follows one
/// interval after the blocked one lands.
pub async fn run_heartbeat(connection: Arc<Connection>, interval: Duration) -> HeartbeatResult {
    let interval = interval.max(MIN_HEARTBEAT_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;
            () = connection.closed() => break HeartbeatResult::Cancelled,
            _ = ticker.tick() => {}
        }

        let Some(registry) = connection.registry() else {
            break HeartbeatResult::Cancelled;
        };
        let peers = registry.list_others(connection.id()).await;
        if connection.enqueue_outbound(heartbeat_frame(&peers)).await.is_err() {
            break HeartbeatResult::EnqueueFailed;
        }
        counter!(HEARTBEATS_TOTAL).increment(1);
    };

    debug!(conn_id = %connection.id(), ?result, "heartbeat stopped");
    connection.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::websocket::registry::Registry;
    use relay_core::{ConnectionId, Frame};

    async fn registered(registry: &Arc<Registry>, id: &str) -> Arc<Connection> {
        let conn = registry.new_connection(ConnectionId::from(id));
        registry.register(Arc::clone(&conn)).await.unwrap();
        conn
    }

    #[tokio::test(start_paused = true)]
    async fn alone_sends_liveness_text() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let _task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(2)));

        assert_eq!(
            a.dequeue_outbound().await.unwrap(),
            Frame::text("[HEARTBEAT]heartbeat from server")
        );
        a.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lists_other_connections() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let _b = registered(&registry, "bbbb").await;
        let _c = registered(&registry, "cccc").await;
        let _task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(2)));

        assert_eq!(
            a.dequeue_outbound().await.unwrap(),
            Frame::text("[ACTIVE]bbbb,cccc")
        );
        a.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let started = Instant::now();
        let _task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(2)));

        let _ = a.dequeue_outbound().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        a.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeats_each_interval() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let started = Instant::now();
        let _task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(2)));

        for _ in 0..3 {
            let _ = a.dequeue_outbound().await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_secs(6));
        a.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::ZERO));

        assert_eq!(
            a.dequeue_outbound().await.unwrap(),
            Frame::text("[HEARTBEAT]heartbeat from server")
        );
        a.close().await;
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            HeartbeatResult::Cancelled | HeartbeatResult::EnqueueFailed
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_queue_does_not_burst_missed_ticks() {
        let mut config = RelayConfig::default();
        config.outbound_capacity = 1;
        let registry = Arc::new(Registry::new(config));
        let a = registered(&registry, "aaaa").await;
        let _task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(1)));

        // One heartbeat fills the queue, the next blocks, the rest are missed.
        time::sleep(Duration::from_secs(10)).await;
        for _ in 0..3 {
            let _ = a.dequeue_outbound().await.unwrap();
        }
        let caught_up = Instant::now();

        let _ = a.dequeue_outbound().await.unwrap();
        assert!(caught_up.elapsed() >= Duration::from_millis(900));
        a.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_on_close() {
        let registry = Arc::new(Registry::new(RelayConfig::default()));
        let a = registered(&registry, "aaaa").await;
        let task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(60)));
        tokio::task::yield_now().await;

        a.close().await;
        assert_eq!(task.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_released_by_close() {
        let mut config = RelayConfig::default();
        config.outbound_capacity = 1;
        let registry = Arc::new(Registry::new(config));
        let a = registered(&registry, "aaaa").await;
        let task = tokio::spawn(run_heartbeat(Arc::clone(&a), Duration::from_secs(1)));

        // Nobody drains the queue: the second heartbeat blocks.
        time::sleep(Duration::from_secs(3)).await;
        assert!(!task.is_finished());

        a.close().await;
        let result = task.await.unwrap();
        assert!(matches!(
            result,
            HeartbeatResult::EnqueueFailed | HeartbeatResult::Cancelled
        ));
        assert!(registry.get("aaaa").await.is_none());
    }
}
