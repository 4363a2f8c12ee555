//! Error taxonomy for the relay.
//!
//! All errors are local to one connection's loops except registration
//! failures, which surface to the transport adapter. None are process-fatal.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Top-level relay error.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The connection's close-signal has fired.
    #[error("connection closed")]
    Closed,
    /// An identity collided with one already registered.
    #[error("duplicate connection identity: {0}")]
    DuplicateIdentity(ConnectionId),
    /// A directed send named an identity that is not registered.
    #[error("no such connection: {0}")]
    NoSuchConnection(String),
    /// An inbound frame could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    /// A decoded message had an empty identity or body.
    #[error("invalid message: empty identity or body")]
    InvalidMessage,
    /// Identity generation failed.
    #[error("identity generation failed: {0}")]
    Identity(#[from] IdentityError),
    /// The underlying stream reported a read or write failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Reasons an inbound payload fails to decode as a routed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload was empty.
    #[error("empty payload")]
    Empty,
    /// The payload was not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    /// No space separated the identity from the body.
    #[error("missing identity separator")]
    MissingSeparator,
    /// The body was not terminated by a newline.
    #[error("missing newline terminator")]
    MissingTerminator,
    /// The frame type carries no routable payload.
    #[error("unsupported frame type")]
    UnsupportedFrame,
}

/// Identity generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// A zero-byte identity was requested.
    #[error("identity length must be non-zero")]
    ZeroLength,
    /// The randomness source failed.
    #[error("entropy source failed: {0}")]
    Entropy(String),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
