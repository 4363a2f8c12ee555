//! A single relayed connection: bounded queues, the close protocol, and the
//! socket pumps.
//!
//! Each connection runs four tasks once started:
//!
//! - read pump: socket → inbound queue
//! - write pump: outbound queue → socket
//! - [`dispatch`](super::dispatch): inbound queue → registry routing
//! - [`heartbeat`](super::heartbeat): periodic frame → outbound queue
//!
//! Any of them may initiate [`Connection::close`]. The close-signal fires
//! exactly once; every blocked queue operation observes it and returns
//! [`RelayError::Closed`].

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relay_core::{ConnectionId, Frame, RelayError, Result};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::dispatch::run_dispatch;
use super::heartbeat::run_heartbeat;
use super::registry::Registry;
use super::transport::{FrameSink, FrameStream};

/// A relayed connection.
pub struct Connection {
    id: ConnectionId,
    registry: Weak<Registry>,
    inbound_tx: mpsc::Sender<Frame>,
    inbound_rx: AsyncMutex<mpsc::Receiver<Frame>>,
    outbound_tx: mpsc::Sender<Frame>,
    outbound_rx: AsyncMutex<mpsc::Receiver<Frame>>,
    /// Guards the false → true transition; the signal is fired under it.
    closed: Mutex<bool>,
    close_signal: CancellationToken,
    connected_at: Instant,
}

impl Connection {
    /// Create an open connection bound to `registry`.
    ///
    /// Capacities are clamped to at least 1.
    pub fn new(
        id: ConnectionId,
        registry: Weak<Registry>,
        inbound_capacity: usize,
        outbound_capacity: usize,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
        Self {
            id,
            registry,
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: AsyncMutex::new(outbound_rx),
            closed: Mutex::new(false),
            close_signal: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// The connection's identity.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.close_signal.cancelled().await;
    }

    /// Time since the connection was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// The owning registry, if it is still alive.
    pub fn registry(&self) -> Option<Arc<Registry>> {
        self.registry.upgrade()
    }

    /// Queue a frame for the write pump.
    ///
    /// Blocks while the outbound queue is full; fails with
    /// [`RelayError::Closed`] once the connection closes.
    pub async fn enqueue_outbound(&self, frame: Frame) -> Result<()> {
        enqueue(&self.outbound_tx, &self.close_signal, frame).await
    }

    /// Queue a frame read from the socket for dispatch.
    pub async fn enqueue_inbound(&self, frame: Frame) -> Result<()> {
        enqueue(&self.inbound_tx, &self.close_signal, frame).await
    }

    /// Take the next inbound frame.
    pub async fn dequeue_inbound(&self) -> Result<Frame> {
        dequeue(&self.inbound_rx, &self.close_signal).await
    }

    /// Take the next outbound frame.
    pub async fn dequeue_outbound(&self) -> Result<Frame> {
        dequeue(&self.outbound_rx, &self.close_signal).await
    }

    /// Close the connection.
    ///
    /// The first call flips the closed flag and fires the close-signal.
    /// Every call asks the registry to drop this connection's entry, so it
    /// is gone by the time any close returns. Another connection registered
    /// under the same identity is left in place. The socket itself is closed
    /// by the write pump when it observes the signal.
    pub async fn close(&self) {
        let first = {
            let mut closed = self.closed.lock();
            if *closed {
                false
            } else {
                *closed = true;
                self.close_signal.cancel();
                true
            }
        };
        if first {
            debug!(
                conn_id = %self.id,
                age_ms = u64::try_from(self.age().as_millis()).unwrap_or(u64::MAX),
                "connection closed"
            );
        }
        if let Some(registry) = self.registry.upgrade() {
            let _ = registry.remove_connection(self).await;
        }
    }

    /// Spawn the read pump, write pump, dispatch loop, and heartbeat.
    pub fn start(
        self: &Arc<Self>,
        sink: FrameSink,
        stream: FrameStream,
        heartbeat_interval: Duration,
        tracker: &TaskTracker,
    ) {
        let _ = tracker.spawn(Arc::clone(self).read_pump(stream));
        let _ = tracker.spawn(Arc::clone(self).write_pump(sink));
        let _ = tracker.spawn(run_dispatch(Arc::clone(self)));
        let _ = tracker.spawn(run_heartbeat(Arc::clone(self), heartbeat_interval));
    }

    /// Socket → inbound queue. Control frames are consumed here.
    pub(crate) async fn read_pump(self: Arc<Self>, mut stream: FrameStream) {
        loop {
            let next = tokio::select! {
                biased;
                () = self.close_signal.cancelled() => break,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(Frame::Close)) => {
                    debug!(conn_id = %self.id, "peer sent close");
                    break;
                }
                Some(Ok(frame)) if frame.is_data() => {
                    if self.enqueue_inbound(frame).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %self.id, error = %e, "read failed");
                    break;
                }
                None => {
                    debug!(conn_id = %self.id, "peer stream ended");
                    break;
                }
            }
        }
        self.close().await;
    }

    /// Outbound queue → socket. Owns the sink and closes it on exit.
    pub(crate) async fn write_pump(self: Arc<Self>, mut sink: FrameSink) {
        while let Ok(frame) = self.dequeue_outbound().await {
            let sent = tokio::select! {
                biased;
                () = self.close_signal.cancelled() => break,
                sent = sink.send(frame) => sent,
            };
            if let Err(e) = sent {
                warn!(conn_id = %self.id, error = %e, "write failed");
                break;
            }
        }
        self.close().await;
        if let Err(e) = sink.close().await {
            debug!(conn_id = %self.id, error = %e, "socket close failed");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn enqueue(
    tx: &mpsc::Sender<Frame>,
    signal: &CancellationToken,
    frame: Frame,
) -> Result<()> {
    tokio::select! {
        biased;
        () = signal.cancelled() => Err(RelayError::Closed),
        sent = tx.send(frame) => sent.map_err(|_| RelayError::Closed),
    }
}

async fn dequeue(
    rx: &AsyncMutex<mpsc::Receiver<Frame>>,
    signal: &CancellationToken,
) -> Result<Frame> {
    tokio::select! {
        biased;
        () = signal.cancelled() => Err(RelayError::Closed),
        frame = async { rx.lock().await.recv().await } => frame.ok_or(RelayError::Closed),
    }
}
