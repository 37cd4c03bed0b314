//! Typing indicators: forwarded to a live recipient, never stored.

use std::sync::Arc;

use super::events::ServerEvent;
use super::registry::SessionRegistry;
use crate::db::UserDirectory;
use crate::models::user::Identity;

pub struct TypingRelay {
    directory: Arc<dyn UserDirectory>,
    registry: Arc<SessionRegistry>,
}

impl TypingRelay {
    pub fn new(directory: Arc<dyn UserDirectory>, registry: Arc<SessionRegistry>) -> Self {
        Self { directory, registry }
    }

    /// Forward a typing indicator. Returns whether it reached a connection.
    pub async fn notify_typing(&self, sender: &Identity, recipient: &str) -> bool {
        self.relay(
            recipient,
            ServerEvent::UserTyping {
                from: sender.username.clone(),
            },
        )
        .await
    }

    pub async fn notify_stop_typing(&self, sender: &Identity, recipient: &str) -> bool {
        self.relay(
            recipient,
            ServerEvent::UserStoppedTyping {
                from: sender.username.clone(),
            },
        )
        .await
    }

    /// At most once. Unknown users, offline users and lookup failures are
    /// all silent no-ops.
    async fn relay(&self, recipient: &str, event: ServerEvent) -> bool {
        let identity = match self.directory.find_by_handle(recipient.trim()).await {
            Ok(Some(identity)) => identity,
            Ok(None) => return false,
            Err(err) => {
                tracing::debug!(%err, "typing relay lookup failed");
                return false;
            }
        };
        match self.registry.lookup(&identity.id) {
            Some(handle) => handle.send(event).is_ok(),
            None => false,
        }
    }
}
