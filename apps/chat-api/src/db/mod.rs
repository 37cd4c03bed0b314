//! Durable storage and user directory seams.
//!
//! The messaging core only talks to the [`DurableStore`] and
//! [`UserDirectory`] traits. Postgres backs them in production; the memory
//! implementations back the tests.

pub mod directory;
pub mod memory;
pub mod pg;
pub mod pool;
pub mod schema;

use async_trait::async_trait;

use crate::models::conversation::{ConversationPair, ConversationSummary, SummaryUpdate};
use crate::models::message::{DirectMessage, RoomMessage};

pub use directory::UserDirectory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for messages and conversation summaries.
///
/// Every write either completes or fails as a whole; a failed call never
/// leaves a partially written message behind.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError>;

    async fn save_room_message(&self, message: &RoomMessage) -> Result<(), StoreError>;

    /// The most recent `limit` messages exchanged within `pair`, oldest first.
    async fn query_direct_messages(
        &self,
        pair: &ConversationPair,
        limit: i64,
    ) -> Result<Vec<DirectMessage>, StoreError>;

    /// The most recent `limit` messages posted to `room`, oldest first.
    async fn query_room_messages(&self, room: &str, limit: i64) -> Result<Vec<RoomMessage>, StoreError>;

    /// Create or update the pair's summary: move the last message forward
    /// and add one to the recipient's unread counter. The increment must be
    /// atomic with respect to concurrent upserts of the same pair.
    async fn upsert_conversation_summary(
        &self,
        update: &SummaryUpdate,
    ) -> Result<ConversationSummary, StoreError>;

    /// All summaries `user_id` participates in, newest activity first.
    async fn query_conversation_summaries(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Mark every message addressed to `recipient_id` within `pair` as read
    /// and zero their counter. Returns how many messages flipped.
    async fn mark_read(&self, pair: &ConversationPair, recipient_id: &str) -> Result<u64, StoreError>;

    /// Full recount of unread messages addressed to `recipient_id` in `pair`.
    async fn count_unread(&self, pair: &ConversationPair, recipient_id: &str) -> Result<i64, StoreError>;

    /// Overwrite a participant's counter. Used to repair from a recount.
    async fn set_unread(&self, pair: &ConversationPair, user_id: &str, count: i64) -> Result<(), StoreError>;

    /// Unread direct messages addressed to `user_id` across all pairs.
    async fn total_unread(&self, user_id: &str) -> Result<i64, StoreError>;
}
