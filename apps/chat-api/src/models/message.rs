use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use super::conversation::ConversationPair;
use super::serialize_i64_as_string;
use super::user::Identity;
use crate::db::schema::{direct_messages, room_messages};

/// A message between two users. Immutable apart from `read`, which is
/// flipped in bulk when the recipient opens or marks the conversation.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = direct_messages)]
pub struct DirectMessage {
    #[serde(serialize_with = "serialize_i64_as_string")]
    #[schema(value_type = String)]
    pub id: i64,
    pub sender_id: String,
    pub sender_username: String,
    pub recipient_id: String,
    pub recipient_username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

impl DirectMessage {
    /// A new, unread message.
    pub fn new(id: i64, sender: &Identity, recipient: &Identity, body: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender_id: sender.id.clone(),
            sender_username: sender.username.clone(),
            recipient_id: recipient.id.clone(),
            recipient_username: recipient.username.clone(),
            body: body.to_string(),
            sent_at,
            read: false,
        }
    }

    pub fn pair(&self) -> ConversationPair {
        ConversationPair::new(&self.sender_id, &self.recipient_id)
    }

    pub fn is_addressed_to(&self, user_id: &str) -> bool {
        self.recipient_id == user_id
    }
}

/// A message broadcast to a room. Rooms carry no read state.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, ToSchema)]
#[diesel(table_name = room_messages)]
pub struct RoomMessage {
    #[serde(serialize_with = "serialize_i64_as_string")]
    #[schema(value_type = String)]
    pub id: i64,
    pub room: String,
    pub sender_id: String,
    pub sender_username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl RoomMessage {
    pub fn new(id: i64, sender: &Identity, room: &str, body: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            id,
            room: room.to_string(),
            sender_id: sender.id.clone(),
            sender_username: sender.username.clone(),
            body: body.to_string(),
            sent_at,
        }
    }
}

/// Ordering key for display: timestamp, ties broken by insertion order
/// (snowflake ids increase with insertion).
pub fn chronological<T>(messages: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    messages.sort_by_key(key);
}
