//! Relay shutdown: stop accepting, close every connection, drain its tasks,
//! then wait for the listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::websocket::registry::Registry;

/// Default budget for the whole shutdown sequence.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// What a [`ShutdownCoordinator::graceful_shutdown`] run achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections registered when the closing pass began.
    pub closed: usize,
    /// Whether every connection task finished in time.
    pub drained: bool,
    /// Whether the serve task finished in time.
    pub listener_stopped: bool,
}

impl ShutdownReport {
    /// Everything stopped within the budget.
    pub fn is_clean(&self) -> bool {
        self.drained && self.listener_stopped
    }
}

/// Owns the stop signal for the listener and the closing of a registry.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    registry: Arc<Registry>,
}

impl ShutdownCoordinator {
    /// Coordinator for the listener serving `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            token: CancellationToken::new(),
            registry,
        }
    }

    /// Token the listener stops on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the listener and close every registered connection.
    ///
    /// Returns the number of connections registered when closing began.
    /// Safe to call more than once.
    pub async fn close_all(&self) -> usize {
        self.token.cancel();
        let closed = self.registry.connection_count();
        self.registry.shutdown().await;
        closed
    }

    /// Run the full sequence: [`close_all`](Self::close_all), drain the
    /// connection tasks, then wait for `serve` to return.
    ///
    /// `timeout` (default [`DEFAULT_SHUTDOWN_TIMEOUT`]) bounds the drain and
    /// the listener wait together.
    pub async fn graceful_shutdown(
        &self,
        serve: JoinHandle<()>,
        timeout: Option<Duration>,
    ) -> ShutdownReport {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let deadline = Instant::now() + timeout;

        let closed = self.close_all().await;
        info!(
            closed,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining connection tasks"
        );
        let drained = self
            .registry
            .drain(deadline.saturating_duration_since(Instant::now()))
            .await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let listener_stopped = match tokio::time::timeout(remaining, serve).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "serve task failed");
                true
            }
            Err(_) => {
                warn!("listener still running after {timeout:?}");
                false
            }
        };

        let report = ShutdownReport {
            closed,
            drained,
            listener_stopped,
        };
        info!(?report, "shutdown complete");
        report
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("shutting_down", &self.is_shutting_down())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
