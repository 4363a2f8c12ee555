//! Wire codec for routed messages and server-originated frames.
//!
//! Inbound data frames carry `<identity> <body>\n`. Everything the server
//! emits is a text frame with one of three prefixes:
//!
//! | Frame | Text |
//! |-------|------|
//! | Heartbeat, no peers | `[HEARTBEAT]heartbeat from server` |
//! | Heartbeat, peers | `[ACTIVE]id1,id2,...` |
//! | Routed message | `[RESPONSE]<body>` |

use crate::constants::{ACTIVE_PREFIX, HEARTBEAT_BODY, HEARTBEAT_PREFIX, RESPONSE_PREFIX};
use crate::errors::{DecodeError, RelayError};
use crate::frame::Frame;
use crate::ids::ConnectionId;

/// A decoded `(target, body)` pair awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    /// Identity of the connection the body is addressed to.
    pub target: String,
    /// Message body, excluding the newline terminator.
    pub body: String,
}

impl RoutedMessage {
    /// Decode the payload of an inbound data frame.
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        if !frame.is_data() {
            return Err(DecodeError::UnsupportedFrame);
        }
        decode(frame.payload())
    }

    /// Reject messages whose identity or body is blank.
    pub fn validate(self) -> Result<Self, RelayError> {
        if self.target.trim().is_empty() || self.body.trim().is_empty() {
            return Err(RelayError::InvalidMessage);
        }
        Ok(self)
    }
}

/// Decode `<identity> <body>\n`.
///
/// The identity is everything before the first space, surrounding
/// whitespace trimmed. The body is everything after that space up to the
/// first newline. Bytes after the newline are ignored.
pub fn decode(payload: &[u8]) -> Result<RoutedMessage, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
    let (target, rest) = text.split_once(' ').ok_or(DecodeError::MissingSeparator)?;
    let (body, _) = rest.split_once('\n').ok_or(DecodeError::MissingTerminator)?;
    Ok(RoutedMessage {
        target: target.trim().to_owned(),
        body: body.to_owned(),
    })
}

/// Build the liveness frame for a connection given the other live identities.
pub fn heartbeat_frame(peers: &[ConnectionId]) -> Frame {
    if peers.is_empty() {
        return Frame::Text(format!("{HEARTBEAT_PREFIX}{HEARTBEAT_BODY}"));
    }
    let joined = peers
        .iter()
        .map(ConnectionId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    Frame::Text(format!("{ACTIVE_PREFIX}{joined}"))
}

/// Build the frame delivering a routed body to its target.
pub fn response_frame(body: &str) -> Frame {
    Frame::Text(format!("{RESPONSE_PREFIX}{body}"))
}
