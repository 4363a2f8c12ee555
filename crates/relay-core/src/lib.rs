//! # relay-core
//!
//! Foundation types shared by every relay crate:
//!
//! - **Identities**: [`ids::ConnectionId`] and the random identity generator
//! - **Frames**: [`frame::Frame`], the unit of data crossing a socket
//! - **Wire codec**: [`codec`] decodes routed messages and builds outbound frames
//! - **Errors**: [`errors::RelayError`] taxonomy via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod codec;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;

pub use codec::{RoutedMessage, decode, heartbeat_frame, response_frame};
pub use errors::{DecodeError, IdentityError, RelayError, Result};
pub use frame::{Frame, FrameKind};
pub use ids::ConnectionId;
