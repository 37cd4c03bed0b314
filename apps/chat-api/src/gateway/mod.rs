//! Live messaging core: sessions, rooms, direct messages, typing and
//! presence, plus the WebSocket transport that drives them.

pub mod conversations;
pub mod direct;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod session;
pub mod typing;
pub mod validate;

use std::sync::Arc;

use chat_common::SnowflakeGenerator;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::db::{DurableStore, UserDirectory};
use crate::models::user::Identity;

use conversations::ConversationAggregator;
use direct::{DirectMessageRouter, HistoryLimits};
use events::ServerEvent;
use handler::HEARTBEAT_INTERVAL_MS;
use presence::PresenceBroadcaster;
use registry::SessionRegistry;
use rooms::RoomHub;
use session::{ConnectionHandle, Session};
use typing::TypingRelay;

/// Tunables for [`ChatGateway`].
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    pub worker_id: u16,
    pub room_backfill_limit: i64,
    pub history: HistoryLimits,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            worker_id: 0,
            room_backfill_limit: 50,
            history: HistoryLimits { default: 50, max: 200 },
        }
    }
}

impl From<&Config> for GatewaySettings {
    fn from(config: &Config) -> Self {
        Self {
            worker_id: config.worker_id,
            room_backfill_limit: config.room_backfill_limit,
            history: HistoryLimits {
                default: config.history_default_limit,
                max: config.history_max_limit,
            },
        }
    }
}

/// One explicitly constructed instance owns the registry and every
/// component that reads it.
pub struct ChatGateway {
    pub registry: Arc<SessionRegistry>,
    pub conversations: Arc<ConversationAggregator>,
    pub rooms: RoomHub,
    pub direct: DirectMessageRouter,
    pub typing: TypingRelay,
    pub presence: PresenceBroadcaster,
}

impl ChatGateway {
    pub fn new(store: Arc<dyn DurableStore>, directory: Arc<dyn UserDirectory>, settings: GatewaySettings) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let snowflake = Arc::new(SnowflakeGenerator::new(settings.worker_id));
        let conversations = Arc::new(ConversationAggregator::new(store.clone()));

        Self {
            rooms: RoomHub::new(store.clone(), snowflake.clone(), settings.room_backfill_limit),
            direct: DirectMessageRouter::new(
                directory.clone(),
                store,
                conversations.clone(),
                registry.clone(),
                snowflake,
                settings.history,
            ),
            typing: TypingRelay::new(directory, registry.clone()),
            presence: PresenceBroadcaster::new(registry.clone()),
            conversations,
            registry,
        }
    }

    /// Admit an authenticated identity. The new connection receives `ready`
    /// and a welcome notification before anything else; every other live
    /// session is told the user came online.
    pub fn connect(&self, identity: Identity) -> (Session, UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = ConnectionHandle::open();
        let session = Session::new(identity, handle);

        session.deliver(ServerEvent::Ready {
            user_id: session.user_id().to_string(),
            username: session.username().to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL_MS,
        });
        session.deliver(ServerEvent::notification(format!("Welcome {}", session.username())));

        if let Some(displaced) = self.registry.admit(session.clone()) {
            tracing::info!(
                user_id = %session.user_id(),
                displaced = %displaced.connection_id(),
                connection_id = %session.connection_id(),
                "session displaced by newer connection"
            );
        }
        self.presence.announce_online(&session.identity);

        (session, rx)
    }

    /// Tear down a connection: leave its rooms and, if it was still the
    /// user's routed session, take the user offline. Returns whether the
    /// user went offline.
    pub fn disconnect(&self, session: &Session) -> bool {
        let left = self.rooms.disconnect(session);
        tracing::debug!(
            connection_id = %session.connection_id(),
            rooms_left = left.len(),
            open_rooms = self.rooms.room_count(),
            "connection closed"
        );

        match self.registry.evict_connection(session.user_id(), session.connection_id()) {
            Some(_) => {
                self.presence.announce_offline(&session.identity);
                true
            }
            None => {
                tracing::debug!(
                    user_id = %session.user_id(),
                    still_online = self.registry.is_online(session.user_id()),
                    "displaced connection closed"
                );
                false
            }
        }
    }
}
