//! Inbound message dispatch.
//!
//! Drains a connection's inbound queue, decodes each frame as a routed
//! message, and hands the wrapped body to the registry for delivery.

use std::sync::Arc;

use metrics::counter;
use relay_core::{RelayError, RoutedMessage, response_frame};
use tracing::{debug, warn};

use super::connection::Connection;
use crate::metrics::{DECODE_ERRORS_TOTAL, MESSAGES_ROUTED_TOTAL, ROUTE_FAILURES_TOTAL};

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// The connection closed.
    Closed,
    /// An inbound frame was not a well-formed routed message.
    Rejected(String),
}

/// Route inbound frames until the connection closes or sends garbage.
///
/// A malformed frame terminates the loop and closes the connection. A
/// missing or closed target only drops that one message.
pub async fn run_dispatch(connection: Arc<Connection>) -> DispatchResult {
    let result = loop {
        let Ok(frame) = connection.dequeue_inbound().await else {
            break DispatchResult::Closed;
        };

        let message = match RoutedMessage::from_frame(&frame)
            .map_err(RelayError::from)
            .and_then(RoutedMessage::validate)
        {
            Ok(m) => m,
            Err(e) => {
                warn!(conn_id = %connection.id(), error = %e, "malformed message, closing connection");
                counter!(DECODE_ERRORS_TOTAL).increment(1);
                break DispatchResult::Rejected(e.to_string());
            }
        };

        let Some(registry) = connection.registry() else {
            break DispatchResult::Closed;
        };
        match registry
            .send_to(&message.target, response_frame(&message.body))
            .await
        {
            Ok(()) => {
                debug!(from = %connection.id(), to = %message.target, "message routed");
                counter!(MESSAGES_ROUTED_TOTAL).increment(1);
            }
            Err(e) => {
                warn!(from = %connection.id(), to = %message.target, error = %e, "route failed");
                counter!(ROUTE_FAILURES_TOTAL).increment(1);
            }
        }
    };
    connection.close().await;
    result
}
