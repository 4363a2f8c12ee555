//! The unit of data crossing a connection's socket.

use bytes::Bytes;

/// Coarse type tag of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text.
    Text,
    /// Opaque binary.
    Binary,
    /// Ping, pong, or close.
    Control,
}

/// One discrete unit of data read from or written to a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
    /// Ping control frame.
    Ping(Bytes),
    /// Pong control frame.
    Pong(Bytes),
    /// Close control frame.
    Close,
}

impl Frame {
    /// Build a text frame.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The frame's type tag.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Binary(_) => FrameKind::Binary,
            Self::Ping(_) | Self::Pong(_) | Self::Close => FrameKind::Control,
        }
    }

    /// Whether this frame carries application data (text or binary).
    pub fn is_data(&self) -> bool {
        !matches!(self.kind(), FrameKind::Control)
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) | Self::Ping(b) | Self::Pong(b) => b,
            Self::Close => &[],
        }
    }

    /// The text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}
