//! In-memory socket halves for exercising connections without a network.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::Sink;
use futures::channel::mpsc;
use relay_core::{Frame, RelayError};

use super::transport::{FrameSink, FrameStream};

/// Sink that forwards frames to a channel and counts `poll_close` calls.
pub(crate) struct CountingSink {
    tx: mpsc::UnboundedSender<Frame>,
    closes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl Sink<Frame> for CountingSink {
    type Error = RelayError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("broken pipe".into()));
        }
        self.tx
            .unbounded_send(item)
            .map_err(|e| RelayError::Transport(e.to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let _ = self.closes.fetch_add(1, Ordering::SeqCst);
        self.tx.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// The remote side of a mock socket.
pub(crate) struct MockPeer {
    /// Push frames (or errors) the connection will read.
    pub inbound: mpsc::UnboundedSender<Result<Frame, RelayError>>,
    /// Frames the connection wrote.
    pub outbound: mpsc::UnboundedReceiver<Frame>,
    /// Number of times the sink was closed.
    pub closes: Arc<AtomicUsize>,
    /// Make every subsequent write fail.
    pub fail_writes: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn send_text(&self, text: &str) {
        self.inbound.unbounded_send(Ok(Frame::text(text))).unwrap();
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Next written frame, as text.
    pub async fn next_text(&mut self) -> Option<String> {
        use futures::StreamExt;
        loop {
            if let Frame::Text(text) = self.outbound.next().await? {
                return Some(text);
            }
        }
    }
}

/// Build a connected sink/stream pair and its peer handle.
pub(crate) fn mock_transport() -> (FrameSink, FrameStream, MockPeer) {
    let (out_tx, out_rx) = mpsc::unbounded();
    let (in_tx, in_rx) = mpsc::unbounded();
    let closes = Arc::new(AtomicUsize::new(0));
    let fail_writes = Arc::new(AtomicBool::new(false));
    let sink = CountingSink {
        tx: out_tx,
        closes: Arc::clone(&closes),
        fail_writes: Arc::clone(&fail_writes),
    };
    let peer = MockPeer {
        inbound: in_tx,
        outbound: out_rx,
        closes,
        fail_writes,
    };
    (Box::pin(sink), Box::pin(in_rx), peer)
}
