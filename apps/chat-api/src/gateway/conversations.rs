//! Conversation summaries and the per-pair lock that keeps them consistent.
//!
//! Every write to a pair's summary (send, mark read, recount) happens under
//! that pair's [`PairGuard`]. Unrelated pairs never contend.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{DurableStore, StoreError};
use crate::models::conversation::{ConversationPair, ConversationSummary, ConversationView, SummaryUpdate};

pub struct ConversationAggregator {
    store: Arc<dyn DurableStore>,
    locks: DashMap<ConversationPair, Arc<Mutex<()>>>,
    /// Pairs whose counters may trail the persisted messages.
    stale: DashSet<ConversationPair>,
}

/// Exclusive access to one conversation pair. The lock table entry is
/// dropped with the last guard or waiter.
pub struct PairGuard<'a> {
    aggregator: &'a ConversationAggregator,
    pair: ConversationPair,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PairGuard<'_> {
    pub fn pair(&self) -> &ConversationPair {
        &self.pair
    }
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the table itself holds the mutex once nobody is waiting.
        self.aggregator
            .locks
            .remove_if(&self.pair, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ConversationAggregator {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            stale: DashSet::new(),
        }
    }

    /// Wait for exclusive access to `pair`.
    pub async fn lock(&self, pair: &ConversationPair) -> PairGuard<'_> {
        let lock = self.locks.entry(pair.clone()).or_default().value().clone();
        let guard = lock.lock_owned().await;
        PairGuard {
            aggregator: self,
            pair: pair.clone(),
            guard: Some(guard),
        }
    }

    /// Fold a persisted message into its pair's summary.
    ///
    /// A failed upsert is retried once. If that fails too the pair is flagged
    /// and its counters are rebuilt by the next successful upsert.
    pub async fn record(
        &self,
        guard: &PairGuard<'_>,
        update: &SummaryUpdate,
    ) -> Result<ConversationSummary, StoreError> {
        debug_assert_eq!(guard.pair(), &update.pair());
        let mut summary = match self.store.upsert_conversation_summary(update).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(
                    %err,
                    low = %guard.pair().low(),
                    high = %guard.pair().high(),
                    "summary upsert failed, retrying"
                );
                match self.store.upsert_conversation_summary(update).await {
                    Ok(summary) => summary,
                    Err(err) => {
                        self.stale.insert(guard.pair().clone());
                        return Err(err);
                    }
                }
            }
        };

        if self.stale.contains(guard.pair()) {
            let counts = self.reconcile(guard).await?;
            self.stale.remove(guard.pair());
            for (user_id, count) in [guard.pair().low(), guard.pair().high()].into_iter().zip(counts) {
                if let Some(participant) = summary.participant_mut(user_id) {
                    participant.unread = count;
                }
            }
        }
        Ok(summary)
    }

    /// Mark everything addressed to `reader` in the guarded pair as read and
    /// zero their counter.
    pub async fn mark_read(&self, guard: &PairGuard<'_>, reader_id: &str) -> Result<u64, StoreError> {
        self.store.mark_read(guard.pair(), reader_id).await
    }

    /// Every conversation `user_id` takes part in, newest activity first.
    pub async fn list_for(&self, user_id: &str) -> Result<Vec<ConversationView>, StoreError> {
        let summaries = self.store.query_conversation_summaries(user_id).await?;
        let mut views: Vec<ConversationView> = summaries.iter().filter_map(|s| s.view_for(user_id)).collect();
        views.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(views)
    }

    /// Unread messages addressed to `user_id` across all conversations.
    pub async fn unread_total(&self, user_id: &str) -> Result<i64, StoreError> {
        self.store.total_unread(user_id).await
    }

    /// Rebuild both counters of `pair` from the messages themselves. Returns
    /// the counts for `[low, high]`.
    pub async fn recount(&self, pair: &ConversationPair) -> Result<[i64; 2], StoreError> {
        let guard = self.lock(pair).await;
        self.reconcile(&guard).await
    }

    async fn reconcile(&self, guard: &PairGuard<'_>) -> Result<[i64; 2], StoreError> {
        let pair = guard.pair();
        let mut counts = [0; 2];
        for (slot, user_id) in [pair.low(), pair.high()].into_iter().enumerate() {
            let count = self.store.count_unread(pair, user_id).await?;
            self.store.set_unread(pair, user_id, count).await?;
            counts[slot] = count;
        }
        tracing::info!(low = %pair.low(), high = %pair.high(), ?counts, "conversation counters recounted");
        Ok(counts)
    }

    /// Pairs with a live guard or waiter.
    pub fn locked_pairs(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::message::DirectMessage;
    use crate::models::user::Identity;

    fn update(sender: &Identity, recipient: &Identity, body: &str) -> SummaryUpdate {
        SummaryUpdate {
            sender: sender.clone(),
            recipient: recipient.clone(),
            body: body.to_string(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lock_table_is_pruned_after_release() {
        let aggregator = ConversationAggregator::new(Arc::new(MemoryStore::new()));
        let pair = ConversationPair::new("usr_a", "usr_b");
        {
            let _guard = aggregator.lock(&pair).await;
            assert_eq!(aggregator.locked_pairs(), 1);
        }
        assert_eq!(aggregator.locked_pairs(), 0);
    }

    #[tokio::test]
    async fn same_pair_is_exclusive() {
        let aggregator = Arc::new(ConversationAggregator::new(Arc::new(MemoryStore::new())));
        let pair = ConversationPair::new("usr_a", "usr_b");
        let guard = aggregator.lock(&pair).await;

        let contender = {
            let aggregator = aggregator.clone();
            let pair = ConversationPair::new("usr_b", "usr_a");
            tokio::spawn(async move {
                let _guard = aggregator.lock(&pair).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // A different pair is not blocked.
        let other = aggregator.lock(&ConversationPair::new("usr_a", "usr_c")).await;
        drop(other);

        drop(guard);
        contender.await.unwrap();
        assert_eq!(aggregator.locked_pairs(), 0);
    }

    #[tokio::test]
    async fn concurrent_records_never_lose_increments() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Arc::new(ConversationAggregator::new(store.clone()));
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");

        let tasks: Vec<_> = (0..25)
            .map(|i| {
                let aggregator = aggregator.clone();
                let (alice, bob) = (alice.clone(), bob.clone());
                tokio::spawn(async move {
                    let update = update(&alice, &bob, &format!("m{i}"));
                    let guard = aggregator.lock(&update.pair()).await;
                    aggregator.record(&guard, &update).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let summary = store.summary(&ConversationPair::new("usr_a", "usr_b")).unwrap();
        assert_eq!(summary.unread_for("usr_b"), 25);
        assert_eq!(summary.unread_for("usr_a"), 0);
    }

    #[tokio::test]
    async fn list_for_projects_counterpart_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = ConversationAggregator::new(store);
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let carol = Identity::new("usr_c", "carol");

        for (sender, recipient) in [(&alice, &bob), (&carol, &alice)] {
            let update = update(sender, recipient, "hello");
            let guard = aggregator.lock(&update.pair()).await;
            aggregator.record(&guard, &update).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let views = aggregator.list_for("usr_a").await.unwrap();
        let with: Vec<_> = views.iter().map(|v| (v.with.as_str(), v.unread_count)).collect();
        assert_eq!(with, [("carol", 1), ("bob", 0)]);
    }

    #[tokio::test]
    async fn recount_repairs_counters() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = ConversationAggregator::new(store.clone());
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let pair = ConversationPair::new("usr_a", "usr_b");

        for id in 1..=3 {
            let message = DirectMessage::new(id, &alice, &bob, "hi", Utc::now());
            store.save_direct_message(&message).await.unwrap();
        }
        // Only one of three messages made it into the summary.
        let update = update(&alice, &bob, "hi");
        {
            let guard = aggregator.lock(&pair).await;
            aggregator.record(&guard, &update).await.unwrap();
        }
        assert_eq!(store.summary(&pair).unwrap().unread_for("usr_b"), 1);

        let counts = aggregator.recount(&pair).await.unwrap();
        assert_eq!(counts, [0, 3]);
        assert_eq!(store.summary(&pair).unwrap().unread_for("usr_b"), 3);
    }
}
