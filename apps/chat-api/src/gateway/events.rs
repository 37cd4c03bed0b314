//! Wire format for the live connection: one closed set of commands in, one
//! closed set of events out.
//!
//! Frames are JSON objects of the form `{"type": "...", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::conversation::ConversationView;
use crate::models::message::{DirectMessage, RoomMessage};
use crate::models::serialize_i64_as_string;
use crate::models::user::Identity;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom {
        room: String,
    },
    LeaveRoom {
        room: String,
    },
    SendRoomMessage {
        room: String,
        body: String,
    },
    SendDirectMessage {
        recipient: String,
        body: String,
    },
    FetchConversation {
        with: String,
        #[serde(default)]
        limit: Option<i64>,
    },
    ListConversations,
    Typing {
        recipient: String,
    },
    StopTyping {
        recipient: String,
    },
    Heartbeat {
        #[serde(default)]
        seq: u64,
    },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Ready {
        user_id: String,
        username: String,
        heartbeat_interval: u64,
    },
    RoomJoined {
        room: String,
        backfill: Vec<RoomMessage>,
    },
    RoomLeft {
        room: String,
    },
    MemberJoined {
        room: String,
        username: String,
    },
    MemberLeft {
        room: String,
        username: String,
    },
    RoomMessage {
        #[serde(serialize_with = "serialize_i64_as_string")]
        id: i64,
        room: String,
        sender: String,
        body: String,
        timestamp: DateTime<Utc>,
    },
    DirectMessage {
        #[serde(serialize_with = "serialize_i64_as_string")]
        id: i64,
        from: String,
        from_user_id: String,
        body: String,
        timestamp: DateTime<Utc>,
    },
    ConversationHistory {
        with: String,
        messages: Vec<DirectMessage>,
    },
    ConversationsList {
        conversations: Vec<ConversationView>,
    },
    UserTyping {
        from: String,
    },
    UserStoppedTyping {
        from: String,
    },
    PresenceOnline {
        user_id: String,
        username: String,
    },
    PresenceOffline {
        user_id: String,
        username: String,
    },
    Notification {
        message: String,
    },
    HeartbeatAck {
        ack: u64,
    },
}

impl ServerEvent {
    pub fn room_message(message: &RoomMessage) -> Self {
        ServerEvent::RoomMessage {
            id: message.id,
            room: message.room.clone(),
            sender: message.sender_username.clone(),
            body: message.body.clone(),
            timestamp: message.sent_at,
        }
    }

    pub fn direct_message(message: &DirectMessage) -> Self {
        ServerEvent::DirectMessage {
            id: message.id,
            from: message.sender_username.clone(),
            from_user_id: message.sender_id.clone(),
            body: message.body.clone(),
            timestamp: message.sent_at,
        }
    }

    pub fn presence_online(identity: &Identity) -> Self {
        ServerEvent::PresenceOnline {
            user_id: identity.id.clone(),
            username: identity.username.clone(),
        }
    }

    pub fn presence_offline(identity: &Identity) -> Self {
        ServerEvent::PresenceOffline {
            user_id: identity.id.clone(),
            username: identity.username.clone(),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        ServerEvent::Notification {
            message: message.into(),
        }
    }

    /// The `type` tag this event serializes with.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => "ready",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::RoomLeft { .. } => "room_left",
            ServerEvent::MemberJoined { .. } => "member_joined",
            ServerEvent::MemberLeft { .. } => "member_left",
            ServerEvent::RoomMessage { .. } => "room_message",
            ServerEvent::DirectMessage { .. } => "direct_message",
            ServerEvent::ConversationHistory { .. } => "conversation_history",
            ServerEvent::ConversationsList { .. } => "conversations_list",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::PresenceOnline { .. } => "presence_online",
            ServerEvent::PresenceOffline { .. } => "presence_offline",
            ServerEvent::Notification { .. } => "notification",
            ServerEvent::HeartbeatAck { .. } => "heartbeat_ack",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"join_room","data":{"room":"general"}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::JoinRoom { room: "general".into() });

        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"fetch_conversation","data":{"with":"bob"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::FetchConversation {
                with: "bob".into(),
                limit: None
            }
        );

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"list_conversations"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::ListConversations);
    }

    #[test]
    fn rejects_unknown_or_incomplete_commands() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"explode"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(
            r#"{"type":"send_direct_message","data":{"recipient":"bob"}}"#
        )
        .is_err());
    }

    #[test]
    fn event_tag_matches_name() {
        let events = [
            ServerEvent::notification("hello"),
            ServerEvent::UserTyping { from: "alice".into() },
            ServerEvent::presence_offline(&Identity::new("usr_1", "alice")),
            ServerEvent::HeartbeatAck { ack: 3 },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn direct_message_event_shape() {
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let msg = DirectMessage::new(42, &alice, &bob, "hey", Utc::now());
        let json = serde_json::to_value(ServerEvent::direct_message(&msg)).unwrap();
        assert_eq!(json["type"], "direct_message");
        assert_eq!(json["data"]["id"], "42");
        assert_eq!(json["data"]["from"], "alice");
        assert_eq!(json["data"]["from_user_id"], "usr_a");
        assert_eq!(json["data"]["body"], "hey");
    }
}
