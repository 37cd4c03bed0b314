//! Direct messages between two users: send, history, read state and the
//! per-user conversation list.

use std::sync::Arc;

use chat_common::{snowflake_datetime, SnowflakeGenerator};
use chrono::Utc;

use super::conversations::ConversationAggregator;
use super::events::ServerEvent;
use super::registry::SessionRegistry;
use super::validate;
use crate::db::{DurableStore, UserDirectory};
use crate::error::ChatError;
use crate::models::conversation::{ConversationPair, ConversationView, SummaryUpdate};
use crate::models::message::DirectMessage;
use crate::models::user::Identity;

/// History page sizes for [`DirectMessageRouter::fetch_history`].
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub default: i64,
    pub max: i64,
}

impl HistoryLimits {
    /// Missing or non-positive limits fall back to the default; anything
    /// above the maximum is clamped.
    pub fn resolve(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.max),
            _ => self.default.min(self.max),
        }
    }
}

pub struct History {
    pub with: Identity,
    pub messages: Vec<DirectMessage>,
}

pub struct DirectMessageRouter {
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn DurableStore>,
    aggregator: Arc<ConversationAggregator>,
    registry: Arc<SessionRegistry>,
    snowflake: Arc<SnowflakeGenerator>,
    limits: HistoryLimits,
}

impl DirectMessageRouter {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn DurableStore>,
        aggregator: Arc<ConversationAggregator>,
        registry: Arc<SessionRegistry>,
        snowflake: Arc<SnowflakeGenerator>,
        limits: HistoryLimits,
    ) -> Self {
        Self {
            directory,
            store,
            aggregator,
            registry,
            snowflake,
            limits,
        }
    }

    /// Resolve a handle through the directory.
    pub async fn resolve(&self, username: &str) -> Result<Identity, ChatError> {
        let username = username.trim();
        match self.directory.find_by_handle(username).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(ChatError::RecipientNotFound(username.to_string())),
            Err(err) => {
                tracing::error!(%err, %username, "user directory lookup failed");
                Err(err.into())
            }
        }
    }

    /// Persist a message, update the pair's summary and deliver it to the
    /// recipient if they are online.
    ///
    /// Runs under the pair lock, so messages within a pair are delivered in
    /// the order they were persisted. Persisting is the commit point: after
    /// it the message is delivered and the send succeeds even if the summary
    /// could not be updated, in which case the aggregator repairs the pair's
    /// counters on its next write.
    pub async fn send(&self, sender: &Identity, recipient: &str, body: &str) -> Result<DirectMessage, ChatError> {
        let body = validate::message_body(body)?;
        let recipient = self.resolve(recipient).await?;
        if recipient.id == sender.id {
            return Err(ChatError::InvalidRequest("You cannot message yourself".into()));
        }

        let pair = ConversationPair::new(&sender.id, &recipient.id);
        let guard = self.aggregator.lock(&pair).await;

        let id = self.snowflake.generate();
        let sent_at = snowflake_datetime(id).unwrap_or_else(Utc::now);
        let message = DirectMessage::new(id, sender, &recipient, body, sent_at);
        if let Err(err) = self.store.save_direct_message(&message).await {
            tracing::error!(%err, sender_id = %sender.id, "failed to persist direct message");
            return Err(err.into());
        }

        let update = SummaryUpdate {
            sender: sender.clone(),
            recipient: recipient.clone(),
            body: message.body.clone(),
            sent_at: message.sent_at,
        };
        if let Err(err) = self.aggregator.record(&guard, &update).await {
            tracing::error!(
                %err,
                message_id = message.id,
                "direct message persisted but summary update failed"
            );
        }

        self.deliver(&recipient, &message);
        drop(guard);
        Ok(message)
    }

    fn deliver(&self, recipient: &Identity, message: &DirectMessage) {
        let Some(handle) = self.registry.lookup(&recipient.id) else {
            tracing::debug!(recipient_id = %recipient.id, "recipient offline, message stored");
            return;
        };
        if let Err(err) = handle.send(ServerEvent::direct_message(message)) {
            tracing::debug!(%err, recipient_id = %recipient.id, "direct message delivery failed");
        }
    }

    /// The most recent messages with `counterpart`, oldest first.
    ///
    /// Opening a conversation is the read receipt: everything addressed to
    /// the requester is marked read before the page is read, so returned
    /// messages already carry `read = true`.
    pub async fn fetch_history(
        &self,
        requester: &Identity,
        counterpart: &str,
        limit: Option<i64>,
    ) -> Result<History, ChatError> {
        let counterpart = self.resolve(counterpart).await?;
        let limit = self.limits.resolve(limit);
        let pair = ConversationPair::new(&requester.id, &counterpart.id);

        let guard = self.aggregator.lock(&pair).await;
        let marked = self.aggregator.mark_read(&guard, &requester.id).await?;
        let messages = self.store.query_direct_messages(&pair, limit).await?;
        drop(guard);

        tracing::debug!(
            user_id = %requester.id,
            with = %counterpart.id,
            marked,
            returned = messages.len(),
            "conversation history fetched"
        );
        Ok(History {
            with: counterpart,
            messages,
        })
    }

    /// Explicit "mark as read" without fetching history. Returns how many
    /// messages flipped.
    pub async fn mark_read(&self, reader: &Identity, counterpart: &str) -> Result<u64, ChatError> {
        let counterpart = self.resolve(counterpart).await?;
        let pair = ConversationPair::new(&reader.id, &counterpart.id);
        let guard = self.aggregator.lock(&pair).await;
        Ok(self.aggregator.mark_read(&guard, &reader.id).await?)
    }

    pub async fn list_conversations(&self, identity: &Identity) -> Result<Vec<ConversationView>, ChatError> {
        Ok(self.aggregator.list_for(&identity.id).await?)
    }

    pub async fn unread_total(&self, identity: &Identity) -> Result<i64, ChatError> {
        Ok(self.aggregator.unread_total(&identity.id).await?)
    }
}
