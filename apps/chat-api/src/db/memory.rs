//! In-process store with the same semantics as the Postgres one.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{DurableStore, StoreError};
use crate::models::conversation::{ConversationPair, ConversationSummary, SummaryUpdate};
use crate::models::message::{chronological, DirectMessage, RoomMessage};

#[derive(Default)]
pub struct MemoryStore {
    direct: RwLock<Vec<DirectMessage>>,
    rooms: RwLock<Vec<RoomMessage>>,
    conversations: DashMap<ConversationPair, ConversationSummary>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored direct message, in insertion order.
    pub fn direct_messages(&self) -> Vec<DirectMessage> {
        self.direct.read().clone()
    }

    /// Every stored room message, in insertion order.
    pub fn room_messages(&self) -> Vec<RoomMessage> {
        self.rooms.read().clone()
    }

    pub fn summary(&self, pair: &ConversationPair) -> Option<ConversationSummary> {
        self.conversations.get(pair).map(|s| s.value().clone())
    }
}

fn most_recent<T: Clone>(
    items: &[T],
    matches: impl Fn(&T) -> bool,
    key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, i64),
    limit: i64,
) -> Vec<T> {
    let mut found: Vec<T> = items.iter().filter(|m| matches(m)).cloned().collect();
    chronological(&mut found, key);
    let keep = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    let skip = found.len().saturating_sub(keep);
    found.split_off(skip)
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError> {
        self.direct.write().push(message.clone());
        Ok(())
    }

    async fn save_room_message(&self, message: &RoomMessage) -> Result<(), StoreError> {
        self.rooms.write().push(message.clone());
        Ok(())
    }

    async fn query_direct_messages(
        &self,
        pair: &ConversationPair,
        limit: i64,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        let direct = self.direct.read();
        Ok(most_recent(
            direct.as_slice(),
            |m| m.pair() == *pair,
            |m| (m.sent_at, m.id),
            limit,
        ))
    }

    async fn query_room_messages(&self, room: &str, limit: i64) -> Result<Vec<RoomMessage>, StoreError> {
        let rooms = self.rooms.read();
        Ok(most_recent(rooms.as_slice(), |m| m.room == room, |m| (m.sent_at, m.id), limit))
    }

    async fn upsert_conversation_summary(
        &self,
        update: &SummaryUpdate,
    ) -> Result<ConversationSummary, StoreError> {
        // The entry guard holds the shard lock, so read-modify-write is atomic.
        let summary = self
            .conversations
            .entry(update.pair())
            .and_modify(|summary| summary.apply(update))
            .or_insert_with(|| ConversationSummary::from_first_message(update));
        Ok(summary.clone())
    }

    async fn query_conversation_summaries(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut found: Vec<ConversationSummary> = self
            .conversations
            .iter()
            .filter(|entry| entry.key().contains(user_id))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(found)
    }

    async fn mark_read(&self, pair: &ConversationPair, recipient_id: &str) -> Result<u64, StoreError> {
        if !pair.contains(recipient_id) {
            return Ok(0);
        }

        let mut marked = 0;
        {
            let mut direct = self.direct.write();
            for message in direct.iter_mut() {
                if !message.read && message.is_addressed_to(recipient_id) && message.pair() == *pair {
                    message.read = true;
                    marked += 1;
                }
            }
        }

        if let Some(mut summary) = self.conversations.get_mut(pair) {
            if let Some(participant) = summary.participant_mut(recipient_id) {
                participant.unread = 0;
            }
        }

        Ok(marked)
    }

    async fn count_unread(&self, pair: &ConversationPair, recipient_id: &str) -> Result<i64, StoreError> {
        let direct = self.direct.read();
        let count = direct
            .iter()
            .filter(|m| !m.read && m.is_addressed_to(recipient_id) && m.pair() == *pair)
            .count();
        Ok(count as i64)
    }

    async fn set_unread(&self, pair: &ConversationPair, user_id: &str, count: i64) -> Result<(), StoreError> {
        if let Some(mut summary) = self.conversations.get_mut(pair) {
            if let Some(participant) = summary.participant_mut(user_id) {
                participant.unread = count;
            }
        }
        Ok(())
    }

    async fn total_unread(&self, user_id: &str) -> Result<i64, StoreError> {
        let direct = self.direct.read();
        Ok(direct.iter().filter(|m| !m.read && m.is_addressed_to(user_id)).count() as i64)
    }
}

/// A [`MemoryStore`] that fails selected operations on demand.
#[cfg(test)]
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_direct_saves: std::sync::atomic::AtomicBool,
    pub fail_room_queries: std::sync::atomic::AtomicBool,
    /// Number of upcoming summary upserts to refuse.
    pub upsert_failures: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FaultyStore {
    fn outage(what: &str) -> StoreError {
        StoreError::Unavailable(format!("{what} offline"))
    }
}

#[cfg(test)]
#[async_trait]
impl DurableStore for FaultyStore {
    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError> {
        if self.fail_direct_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Self::outage("direct messages"));
        }
        self.inner.save_direct_message(message).await
    }

    async fn save_room_message(&self, message: &RoomMessage) -> Result<(), StoreError> {
        self.inner.save_room_message(message).await
    }

    async fn query_direct_messages(&self, pair: &ConversationPair, limit: i64) -> Result<Vec<DirectMessage>, StoreError> {
        self.inner.query_direct_messages(pair, limit).await
    }

    async fn query_room_messages(&self, room: &str, limit: i64) -> Result<Vec<RoomMessage>, StoreError> {
        if self.fail_room_queries.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Self::outage("room history"));
        }
        self.inner.query_room_messages(room, limit).await
    }

    async fn upsert_conversation_summary(&self, update: &SummaryUpdate) -> Result<ConversationSummary, StoreError> {
        use std::sync::atomic::Ordering;
        let refused = self
            .upsert_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Self::outage("summaries"));
        }
        self.inner.upsert_conversation_summary(update).await
    }

    async fn query_conversation_summaries(&self, user_id: &str) -> Result<Vec<ConversationSummary>, StoreError> {
        self.inner.query_conversation_summaries(user_id).await
    }

    async fn mark_read(&self, pair: &ConversationPair, recipient_id: &str) -> Result<u64, StoreError> {
        self.inner.mark_read(pair, recipient_id).await
    }

    async fn count_unread(&self, pair: &ConversationPair, recipient_id: &str) -> Result<i64, StoreError> {
        self.inner.count_unread(pair, recipient_id).await
    }

    async fn set_unread(&self, pair: &ConversationPair, user_id: &str, count: i64) -> Result<(), StoreError> {
        self.inner.set_unread(pair, user_id, count).await
    }

    async fn total_unread(&self, user_id: &str) -> Result<i64, StoreError> {
        self.inner.total_unread(user_id).await
    }
}
