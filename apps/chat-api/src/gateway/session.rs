//! Live session state: an identity bound to one reachable connection.

use chat_common::id::{prefix, prefixed_ulid};
use tokio::sync::mpsc;

use super::events::ServerEvent;
use crate::models::user::Identity;

/// Delivery to a connection whose event loop has gone away.
///
/// Never fatal: callers log it and fall back to offline semantics.
#[derive(Debug, thiserror::Error)]
#[error("connection {connection_id} is closed")]
pub struct DeliveryError {
    pub connection_id: String,
}

/// Sending half of a connection's outbound event queue.
///
/// Sending never blocks, so registry and room operations that deliver events
/// stay free of I/O.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: String,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh `conn_` id and the receiver its
    /// connection task drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            connection_id: prefixed_ulid(prefix::CONNECTION),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.connection_id
    }

    pub fn send(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        self.tx.send(event).map_err(|_| DeliveryError {
            connection_id: self.connection_id.clone(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Immutable binding of an [`Identity`] to a [`ConnectionHandle`].
///
/// Room membership is tracked by the room hub, keyed by connection id, not
/// stored on the session.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub handle: ConnectionHandle,
}

impl Session {
    pub fn new(identity: Identity, handle: ConnectionHandle) -> Self {
        Self { identity, handle }
    }

    pub fn user_id(&self) -> &str {
        &self.identity.id
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn connection_id(&self) -> &str {
        self.handle.id()
    }

    /// Best-effort delivery to this session's own connection.
    pub fn deliver(&self, event: ServerEvent) {
        if let Err(err) = self.handle.send(event) {
            tracing::debug!(%err, user_id = %self.identity.id, "delivery to own connection failed");
        }
    }
}
