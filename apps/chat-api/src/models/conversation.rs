//! Per-pair conversation summaries and their unread counters.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use super::user::Identity;
use crate::db::schema::conversations;

/// Unordered pair of user ids, stored in sorted order so `(a, b)` and
/// `(b, a)` name the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationPair {
    low: String,
    high: String,
}

impl ConversationPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                low: a.to_string(),
                high: b.to_string(),
            }
        } else {
            Self {
                low: b.to_string(),
                high: a.to_string(),
            }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    /// Index of `user_id` in the pair: 0 for the low id, 1 for the high id.
    pub fn slot(&self, user_id: &str) -> Option<usize> {
        if user_id == self.low {
            Some(0)
        } else if user_id == self.high {
            Some(1)
        } else {
            None
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.slot(user_id).is_some()
    }

    /// The other participant's id.
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        match self.slot(user_id)? {
            0 => Some(&self.high),
            _ => Some(&self.low),
        }
    }
}

/// One side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    pub unread: i64,
}

/// Durable summary for one conversation pair.
///
/// `participants` is aligned with [`ConversationPair`] ordering: index 0 is
/// the low id. The unread counter lives on the participant it belongs to;
/// this is the only representation of unread state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub participants: [Participant; 2],
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
}

impl ConversationSummary {
    /// Summary created by the first message in a pair.
    pub fn from_first_message(update: &SummaryUpdate) -> Self {
        let pair = update.pair();
        let make = |id: &str| {
            let identity = if id == update.sender.id {
                &update.sender
            } else {
                &update.recipient
            };
            Participant {
                user_id: identity.id.clone(),
                username: identity.username.clone(),
                unread: if id == update.recipient.id { 1 } else { 0 },
            }
        };
        Self {
            participants: [make(pair.low()), make(pair.high())],
            last_message: update.body.clone(),
            last_message_at: update.sent_at,
        }
    }

    /// Fold another message into an existing summary.
    pub fn apply(&mut self, update: &SummaryUpdate) {
        self.last_message = update.body.clone();
        self.last_message_at = update.sent_at;
        for participant in &mut self.participants {
            if participant.user_id == update.sender.id {
                participant.username = update.sender.username.clone();
            }
            if participant.user_id == update.recipient.id {
                participant.username = update.recipient.username.clone();
                participant.unread += 1;
            }
        }
    }

    pub fn pair(&self) -> ConversationPair {
        ConversationPair::new(&self.participants[0].user_id, &self.participants[1].user_id)
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn counterpart(&self, user_id: &str) -> Option<&Participant> {
        let slot = self.pair().slot(user_id)?;
        Some(&self.participants[1 - slot])
    }

    /// Unread count for `user_id`; zero for non-participants.
    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.participant(user_id).map(|p| p.unread).unwrap_or(0)
    }

    /// Project the summary onto one participant's view.
    pub fn view_for(&self, user_id: &str) -> Option<ConversationView> {
        let other = self.counterpart(user_id)?;
        Some(ConversationView {
            with: other.username.clone(),
            with_user_id: other.user_id.clone(),
            last_message: self.last_message.clone(),
            last_message_time: self.last_message_at,
            unread_count: self.unread_for(user_id),
        })
    }
}

/// What a single direct message contributes to its pair's summary.
#[derive(Debug, Clone)]
pub struct SummaryUpdate {
    pub sender: Identity,
    pub recipient: Identity,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl SummaryUpdate {
    pub fn pair(&self) -> ConversationPair {
        ConversationPair::new(&self.sender.id, &self.recipient.id)
    }
}

/// A conversation as seen by one participant.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConversationView {
    /// Counterpart username.
    pub with: String,
    pub with_user_id: String,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: i64,
}

// ---------------------------------------------------------------------------
// Database rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversations)]
pub struct ConversationRow {
    pub user_low: String,
    pub user_high: String,
    pub username_low: String,
    pub username_high: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_low: i64,
    pub unread_high: i64,
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        Self {
            participants: [
                Participant {
                    user_id: row.user_low,
                    username: row.username_low,
                    unread: row.unread_low,
                },
                Participant {
                    user_id: row.user_high,
                    username: row.username_high,
                    unread: row.unread_high,
                },
            ],
            last_message: row.last_message,
            last_message_at: row.last_message_at,
        }
    }
}

/// Insert half of the summary upsert. Unread columns carry the increment.
#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation<'a> {
    pub user_low: &'a str,
    pub user_high: &'a str,
    pub username_low: &'a str,
    pub username_high: &'a str,
    pub last_message: &'a str,
    pub last_message_at: DateTime<Utc>,
    pub unread_low: i64,
    pub unread_high: i64,
}

impl<'a> NewConversation<'a> {
    pub fn from_update(update: &'a SummaryUpdate, pair: &'a ConversationPair) -> Self {
        let (low, high) = if pair.low() == update.sender.id {
            (&update.sender, &update.recipient)
        } else {
            (&update.recipient, &update.sender)
        };
        let recipient_is_low = low.id == update.recipient.id;
        Self {
            user_low: pair.low(),
            user_high: pair.high(),
            username_low: &low.username,
            username_high: &high.username,
            last_message: &update.body,
            last_message_at: update.sent_at,
            unread_low: i64::from(recipient_is_low),
            unread_high: i64::from(!recipient_is_low),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(from: &Identity, to: &Identity, body: &str) -> SummaryUpdate {
        SummaryUpdate {
            sender: from.clone(),
            recipient: to.clone(),
            body: body.to_string(),
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn pair_is_unordered() {
        let ab = ConversationPair::new("usr_a", "usr_b");
        let ba = ConversationPair::new("usr_b", "usr_a");
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), "usr_a");
        assert_eq!(ab.counterpart("usr_a"), Some("usr_b"));
        assert_eq!(ab.counterpart("usr_b"), Some("usr_a"));
        assert_eq!(ab.counterpart("usr_c"), None);
    }

    #[test]
    fn first_message_counts_for_recipient_only() {
        let alice = Identity::new("usr_b", "alice");
        let bob = Identity::new("usr_a", "bob");
        let summary = ConversationSummary::from_first_message(&update(&alice, &bob, "hey"));

        assert_eq!(summary.participants[0].user_id, "usr_a");
        assert_eq!(summary.unread_for("usr_a"), 1);
        assert_eq!(summary.unread_for("usr_b"), 0);
        assert_eq!(summary.last_message, "hey");
    }

    #[test]
    fn apply_increments_recipient_and_moves_last_message() {
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let mut summary = ConversationSummary::from_first_message(&update(&alice, &bob, "one"));
        summary.apply(&update(&alice, &bob, "two"));
        summary.apply(&update(&bob, &alice, "three"));

        assert_eq!(summary.unread_for("usr_b"), 2);
        assert_eq!(summary.unread_for("usr_a"), 1);
        assert_eq!(summary.last_message, "three");
    }

    #[test]
    fn view_projects_counterpart() {
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let summary = ConversationSummary::from_first_message(&update(&alice, &bob, "hey"));

        let view = summary.view_for("usr_b").unwrap();
        assert_eq!(view.with, "alice");
        assert_eq!(view.unread_count, 1);
        assert_eq!(summary.view_for("usr_a").unwrap().unread_count, 0);
        assert!(summary.view_for("usr_z").is_none());
    }

    #[test]
    fn new_conversation_row_aligns_increment_with_recipient() {
        let alice = Identity::new("usr_a", "alice");
        let bob = Identity::new("usr_b", "bob");
        let u = update(&bob, &alice, "hi");
        let pair = u.pair();
        let row = NewConversation::from_update(&u, &pair);
        assert_eq!(row.username_low, "alice");
        assert_eq!(row.unread_low, 1);
        assert_eq!(row.unread_high, 0);
    }
}
