//! Named broadcast groups with per-connection membership.
//!
//! Membership is keyed by connection id, with a reverse index from
//! connection to rooms so a disconnect can leave everything at once. Each
//! room lives in its own `DashMap` entry: join, leave and fan-out for a room
//! are exclusive with each other at that entry only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chat_common::{snowflake_datetime, SnowflakeGenerator};
use chrono::Utc;
use dashmap::DashMap;

use super::events::ServerEvent;
use super::fanout::{fan_out, FanoutReport};
use super::session::{ConnectionHandle, Session};
use super::validate;
use crate::db::DurableStore;
use crate::error::ChatError;
use crate::models::message::RoomMessage;
use crate::models::user::Identity;

#[derive(Debug, Clone)]
struct Member {
    identity: Identity,
    handle: ConnectionHandle,
}

#[derive(Debug, Default)]
struct Room {
    /// Keyed by connection id.
    members: HashMap<String, Member>,
}

pub struct RoomHub {
    rooms: DashMap<String, Room>,
    memberships: DashMap<String, HashSet<String>>,
    store: Arc<dyn DurableStore>,
    snowflake: Arc<SnowflakeGenerator>,
    backfill_limit: i64,
}

impl RoomHub {
    pub fn new(store: Arc<dyn DurableStore>, snowflake: Arc<SnowflakeGenerator>, backfill_limit: i64) -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            store,
            snowflake,
            backfill_limit,
        }
    }

    /// Add the session's connection to `room` and return the most recent
    /// persisted messages, oldest first.
    ///
    /// Membership is added before backfill is read so nothing posted in
    /// between is lost; such a message may show up both in the backfill and
    /// live. Other members are told about the join only once the backfill
    /// read succeeded. Joining a room twice returns backfill again without a
    /// second announcement.
    pub async fn join(&self, session: &Session, room: &str) -> Result<(String, Vec<RoomMessage>), ChatError> {
        let room = validate::room_name(room)?.to_string();
        let newly_joined = self.add_member(session, &room);

        let backfill = match self.store.query_room_messages(&room, self.backfill_limit).await {
            Ok(backfill) => backfill,
            Err(err) => {
                tracing::error!(%err, room = %room, "failed to read room backfill");
                if newly_joined {
                    self.remove_member(session.connection_id(), &room);
                }
                return Err(err.into());
            }
        };

        if newly_joined {
            tracing::debug!(user_id = %session.user_id(), room = %room, "joined room");
            self.broadcast_except(
                &room,
                session.connection_id(),
                &ServerEvent::MemberJoined {
                    room: room.clone(),
                    username: session.username().to_string(),
                },
            );
        }

        Ok((room, backfill))
    }

    /// Persist a message and fan it out to every member, sender included.
    ///
    /// Non-members are rejected before anything is written.
    pub async fn send(&self, session: &Session, room: &str, body: &str) -> Result<RoomMessage, ChatError> {
        let room = validate::room_name(room)?;
        let body = validate::message_body(body)?;
        if !self.is_member(session.connection_id(), room) {
            return Err(ChatError::NotMember(room.to_string()));
        }

        let id = self.snowflake.generate();
        let sent_at = snowflake_datetime(id).unwrap_or_else(Utc::now);
        let message = RoomMessage::new(id, &session.identity, room, body, sent_at);
        if let Err(err) = self.store.save_room_message(&message).await {
            tracing::error!(%err, room = %room, "failed to persist room message");
            return Err(err.into());
        }

        let report = self.broadcast(room, &ServerEvent::room_message(&message));
        tracing::debug!(
            room = %room,
            message_id = message.id,
            delivered = report.delivered,
            "room message fanned out"
        );
        Ok(message)
    }

    /// Remove the session's connection from `room`. Returns `false` (and
    /// tells nobody) if it was not a member.
    pub fn leave(&self, session: &Session, room: &str) -> bool {
        let room = room.trim();
        if !self.remove_member(session.connection_id(), room) {
            return false;
        }
        self.announce_departure(room, &session.identity);
        true
    }

    /// Leave every room the connection had joined. Returns the rooms left.
    pub fn disconnect(&self, session: &Session) -> Vec<String> {
        let Some((_, rooms)) = self.memberships.remove(session.connection_id()) else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(rooms.len());
        for room in rooms {
            if self.remove_from_room(session.connection_id(), &room) {
                self.announce_departure(&room, &session.identity);
                left.push(room);
            }
        }
        left
    }

    /// Usernames currently in `room`, sorted.
    pub fn members(&self, room: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .rooms
            .get(room)
            .map(|r| r.members.values().map(|m| m.identity.username.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn is_member(&self, connection_id: &str, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|r| r.members.contains_key(connection_id))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn add_member(&self, session: &Session, room: &str) -> bool {
        let newly_joined = {
            let mut entry = self.rooms.entry(room.to_string()).or_default();
            entry
                .members
                .insert(
                    session.connection_id().to_string(),
                    Member {
                        identity: session.identity.clone(),
                        handle: session.handle.clone(),
                    },
                )
                .is_none()
        };
        self.memberships
            .entry(session.connection_id().to_string())
            .or_default()
            .insert(room.to_string());
        newly_joined
    }

    fn remove_member(&self, connection_id: &str, room: &str) -> bool {
        let removed = self.remove_from_room(connection_id, room);
        if let Some(mut rooms) = self.memberships.get_mut(connection_id) {
            rooms.remove(room);
        }
        self.memberships.remove_if(connection_id, |_, rooms| rooms.is_empty());
        removed
    }

    fn remove_from_room(&self, connection_id: &str, room: &str) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut entry) => entry.members.remove(connection_id).is_some(),
            None => false,
        };
        self.rooms.remove_if(room, |_, r| r.members.is_empty());
        removed
    }

    fn announce_departure(&self, room: &str, identity: &Identity) {
        tracing::debug!(user_id = %identity.id, room = %room, "left room");
        self.broadcast(
            room,
            &ServerEvent::MemberLeft {
                room: room.to_string(),
                username: identity.username.clone(),
            },
        );
    }

    /// Fan out while holding the room entry, so membership cannot change
    /// mid-delivery. Handle sends never block.
    fn broadcast(&self, room: &str, event: &ServerEvent) -> FanoutReport {
        match self.rooms.get(room) {
            Some(entry) => fan_out(entry.members.values().map(|m| &m.handle), event),
            None => FanoutReport::default(),
        }
    }

    fn broadcast_except(&self, room: &str, connection_id: &str, event: &ServerEvent) -> FanoutReport {
        match self.rooms.get(room) {
            Some(entry) => fan_out(
                entry
                    .members
                    .iter()
                    .filter(|(id, _)| id.as_str() != connection_id)
                    .map(|(_, m)| &m.handle),
                event,
            ),
            None => FanoutReport::default(),
        }
    }
}
