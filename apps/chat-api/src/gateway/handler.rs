//! Dispatch of inbound commands to the gateway components.

use super::events::{ClientCommand, ServerEvent};
use super::session::Session;
use super::ChatGateway;
use crate::error::ChatError;

/// Heartbeat interval advertised in `ready` (ms).
pub const HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// Run one command for `session`. Replies go to the session's own
/// connection; failures are reported to it as a `notification` and never
/// broadcast.
pub async fn handle_command(gateway: &ChatGateway, session: &Session, command: ClientCommand) {
    if let Err(err) = dispatch(gateway, session, command).await {
        tracing::debug!(user_id = %session.user_id(), error = %err, "command failed");
        session.deliver(ServerEvent::notification(err.notification_text()));
    }
}

async fn dispatch(gateway: &ChatGateway, session: &Session, command: ClientCommand) -> Result<(), ChatError> {
    match command {
        ClientCommand::JoinRoom { room } => {
            let (room, backfill) = gateway.rooms.join(session, &room).await?;
            session.deliver(ServerEvent::RoomJoined { room, backfill });
        }
        ClientCommand::LeaveRoom { room } => {
            if gateway.rooms.leave(session, &room) {
                session.deliver(ServerEvent::RoomLeft {
                    room: room.trim().to_string(),
                });
            }
        }
        ClientCommand::SendRoomMessage { room, body } => {
            gateway.rooms.send(session, &room, &body).await?;
        }
        ClientCommand::SendDirectMessage { recipient, body } => {
            gateway.direct.send(&session.identity, &recipient, &body).await?;
        }
        ClientCommand::FetchConversation { with, limit } => {
            let history = gateway.direct.fetch_history(&session.identity, &with, limit).await?;
            session.deliver(ServerEvent::ConversationHistory {
                with: history.with.username,
                messages: history.messages,
            });
        }
        ClientCommand::ListConversations => {
            let conversations = gateway.direct.list_conversations(&session.identity).await?;
            session.deliver(ServerEvent::ConversationsList { conversations });
        }
        ClientCommand::Typing { recipient } => {
            gateway.typing.notify_typing(&session.identity, &recipient).await;
        }
        ClientCommand::StopTyping { recipient } => {
            gateway.typing.notify_stop_typing(&session.identity, &recipient).await;
        }
        ClientCommand::Heartbeat { seq } => {
            session.deliver(ServerEvent::HeartbeatAck { ack: seq });
        }
    }
    Ok(())
}
