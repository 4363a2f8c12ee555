//! Frame-level view of a duplex socket.
//!
//! A connection owns its socket as two halves: a [`FrameSink`] driven by the
//! write pump and a [`FrameStream`] driven by the read pump. The Axum
//! adapter below produces both from an upgraded `WebSocket`; tests build
//! them from in-memory channels.

use std::pin::Pin;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use relay_core::{Frame, RelayError};

/// Outbound half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = RelayError> + Send>>;

/// Inbound half of a socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, RelayError>> + Send>>;

/// Split an upgraded `WebSocket` into frame halves.
pub fn split_websocket(socket: WebSocket) -> (FrameSink, FrameStream) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(|e| RelayError::Transport(e.to_string()))
        .with(|frame: Frame| future::ready(Ok::<_, RelayError>(into_message(frame))));
    let stream = stream.map(|msg| {
        msg.map(from_message)
            .map_err(|e| RelayError::Transport(e.to_string()))
    });
    (Box::pin(sink), Box::pin(stream))
}

/// Convert a frame to an Axum `WebSocket` message.
pub fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

/// Convert an Axum `WebSocket` message to a frame.
pub fn from_message(msg: Message) -> Frame {
    match msg {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}
