//! Postgres-backed [`DurableStore`].

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;

use super::pool::DbPool;
use super::schema::{conversations, direct_messages, room_messages};
use super::{DurableStore, StoreError};
use crate::models::conversation::{
    ConversationPair, ConversationRow, ConversationSummary, NewConversation, SummaryUpdate,
};
use crate::models::message::{DirectMessage, RoomMessage};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(direct_messages::table).values(message),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn save_room_message(&self, message: &RoomMessage) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(room_messages::table).values(message),
            &mut conn,
        )
        .await?;
        Ok(())
    }

    async fn query_direct_messages(
        &self,
        pair: &ConversationPair,
        limit: i64,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        let mut conn = self.pool.get().await?;
        let (a, b) = (pair.low(), pair.high());

        let mut messages: Vec<DirectMessage> = diesel_async::RunQueryDsl::load(
            direct_messages::table
                .filter(
                    direct_messages::sender_id
                        .eq(a)
                        .and(direct_messages::recipient_id.eq(b))
                        .or(direct_messages::sender_id
                            .eq(b)
                            .and(direct_messages::recipient_id.eq(a))),
                )
                .order((direct_messages::sent_at.desc(), direct_messages::id.desc()))
                .limit(limit)
                .select(DirectMessage::as_select()),
            &mut conn,
        )
        .await?;

        messages.reverse();
        Ok(messages)
    }

    async fn query_room_messages(&self, room: &str, limit: i64) -> Result<Vec<RoomMessage>, StoreError> {
        let mut conn = self.pool.get().await?;

        let mut messages: Vec<RoomMessage> = diesel_async::RunQueryDsl::load(
            room_messages::table
                .filter(room_messages::room.eq(room))
                .order((room_messages::sent_at.desc(), room_messages::id.desc()))
                .limit(limit)
                .select(RoomMessage::as_select()),
            &mut conn,
        )
        .await?;

        messages.reverse();
        Ok(messages)
    }

    async fn upsert_conversation_summary(
        &self,
        update: &SummaryUpdate,
    ) -> Result<ConversationSummary, StoreError> {
        let mut conn = self.pool.get().await?;
        let pair = update.pair();

        // The increment is evaluated by Postgres against the locked row, so
        // concurrent upserts of one pair cannot lose a count.
        let row: ConversationRow = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(conversations::table)
                .values(NewConversation::from_update(update, &pair))
                .on_conflict((conversations::user_low, conversations::user_high))
                .do_update()
                .set((
                    conversations::username_low.eq(excluded(conversations::username_low)),
                    conversations::username_high.eq(excluded(conversations::username_high)),
                    conversations::last_message.eq(excluded(conversations::last_message)),
                    conversations::last_message_at.eq(excluded(conversations::last_message_at)),
                    conversations::unread_low
                        .eq(conversations::unread_low + excluded(conversations::unread_low)),
                    conversations::unread_high
                        .eq(conversations::unread_high + excluded(conversations::unread_high)),
                    conversations::updated_at.eq(Utc::now()),
                ))
                .returning(ConversationRow::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(row.into())
    }

    async fn query_conversation_summaries(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<ConversationRow> = diesel_async::RunQueryDsl::load(
            conversations::table
                .filter(
                    conversations::user_low
                        .eq(user_id)
                        .or(conversations::user_high.eq(user_id)),
                )
                .order(conversations::last_message_at.desc())
                .select(ConversationRow::as_select()),
            &mut conn,
        )
        .await?;

        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    async fn mark_read(&self, pair: &ConversationPair, recipient_id: &str) -> Result<u64, StoreError> {
        let Some(sender_id) = pair.counterpart(recipient_id) else {
            return Ok(0);
        };
        let recipient_is_low = pair.low() == recipient_id;

        let mut conn = self.pool.get().await?;
        let marked = conn
            .transaction::<_, StoreError, _>(|conn| {
                async move {
                    let marked = diesel_async::RunQueryDsl::execute(
                        diesel::update(
                            direct_messages::table
                                .filter(direct_messages::sender_id.eq(sender_id))
                                .filter(direct_messages::recipient_id.eq(recipient_id))
                                .filter(direct_messages::read.eq(false)),
                        )
                        .set(direct_messages::read.eq(true)),
                        conn,
                    )
                    .await?;

                    let target = conversations::table.find((pair.low(), pair.high()));
                    if recipient_is_low {
                        diesel_async::RunQueryDsl::execute(
                            diesel::update(target).set(conversations::unread_low.eq(0)),
                            conn,
                        )
                        .await?;
                    } else {
                        diesel_async::RunQueryDsl::execute(
                            diesel::update(target).set(conversations::unread_high.eq(0)),
                            conn,
                        )
                        .await?;
                    }

                    Ok(marked as u64)
                }
                .scope_boxed()
            })
            .await?;

        Ok(marked)
    }

    async fn count_unread(&self, pair: &ConversationPair, recipient_id: &str) -> Result<i64, StoreError> {
        let Some(sender_id) = pair.counterpart(recipient_id) else {
            return Ok(0);
        };
        let mut conn = self.pool.get().await?;

        let count: i64 = diesel_async::RunQueryDsl::get_result(
            direct_messages::table
                .filter(direct_messages::sender_id.eq(sender_id))
                .filter(direct_messages::recipient_id.eq(recipient_id))
                .filter(direct_messages::read.eq(false))
                .count(),
            &mut conn,
        )
        .await?;

        Ok(count)
    }

    async fn set_unread(&self, pair: &ConversationPair, user_id: &str, count: i64) -> Result<(), StoreError> {
        let Some(slot) = pair.slot(user_id) else {
            return Ok(());
        };
        let mut conn = self.pool.get().await?;
        let target = conversations::table.find((pair.low(), pair.high()));

        if slot == 0 {
            diesel_async::RunQueryDsl::execute(
                diesel::update(target).set(conversations::unread_low.eq(count)),
                &mut conn,
            )
            .await?;
        } else {
            diesel_async::RunQueryDsl::execute(
                diesel::update(target).set(conversations::unread_high.eq(count)),
                &mut conn,
            )
            .await?;
        }

        Ok(())
    }

    async fn total_unread(&self, user_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = diesel_async::RunQueryDsl::get_result(
            direct_messages::table
                .filter(direct_messages::recipient_id.eq(user_id))
                .filter(direct_messages::read.eq(false))
                .count(),
            &mut conn,
        )
        .await?;

        Ok(count)
    }
}
