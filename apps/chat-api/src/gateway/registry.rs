//! Process-wide map from user id to the live session that receives routed
//! events for that user.

use dashmap::DashMap;

use super::session::{ConnectionHandle, Session};

/// Single source of truth for "is this user currently reachable".
///
/// Backed by `DashMap`, so each operation is atomic on its own and only
/// locks the shard holding that user. Last connect wins: admitting a second
/// connection for the same user replaces the mapping without closing the
/// earlier connection.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the session for its user. Returns the displaced
    /// session, if any.
    pub fn admit(&self, session: Session) -> Option<Session> {
        self.sessions.insert(session.identity.id.clone(), session)
    }

    /// The handle routed events for `user_id` should go to. `None` means
    /// offline.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.sessions.get(user_id).map(|s| s.handle.clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Remove the mapping for `user_id`. Idempotent.
    pub fn evict(&self, user_id: &str) -> Option<Session> {
        self.sessions.remove(user_id).map(|(_, s)| s)
    }

    /// Remove the mapping only if it still points at `connection_id`.
    ///
    /// A displaced connection closing must not take its replacement offline.
    pub fn evict_connection(&self, user_id: &str, connection_id: &str) -> Option<Session> {
        self.sessions
            .remove_if(user_id, |_, s| s.connection_id() == connection_id)
            .map(|(_, s)| s)
    }

    /// Snapshot of every live session except those of `user_id`.
    pub fn others(&self, user_id: &str) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| entry.key() != user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::user::Identity;

    fn session(id: &str, name: &str) -> Session {
        let (handle, _rx) = ConnectionHandle::open();
        Session::new(Identity::new(id, name), handle)
    }

    #[test]
    fn admit_and_lookup() {
        let registry = SessionRegistry::new();
        let alice = session("usr_a", "alice");
        assert!(registry.admit(alice.clone()).is_none());

        let handle = registry.lookup("usr_a").unwrap();
        assert_eq!(handle.id(), alice.connection_id());
        assert!(registry.lookup("usr_b").is_none());
        assert!(registry.is_online("usr_a"));
    }

    #[test]
    fn last_connect_wins() {
        let registry = SessionRegistry::new();
        let first = session("usr_a", "alice");
        let second = session("usr_a", "alice");

        registry.admit(first.clone());
        let displaced = registry.admit(second.clone()).unwrap();

        assert_eq!(displaced.connection_id(), first.connection_id());
        assert_eq!(registry.lookup("usr_a").unwrap().id(), second.connection_id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn evict_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.admit(session("usr_a", "alice"));

        assert!(registry.evict("usr_a").is_some());
        assert!(registry.evict("usr_a").is_none());
        assert!(registry.lookup("usr_a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn displaced_connection_cannot_evict_replacement() {
        let registry = SessionRegistry::new();
        let first = session("usr_a", "alice");
        let second = session("usr_a", "alice");
        registry.admit(first.clone());
        registry.admit(second.clone());

        assert!(registry.evict_connection("usr_a", first.connection_id()).is_none());
        assert!(registry.is_online("usr_a"));

        assert!(registry.evict_connection("usr_a", second.connection_id()).is_some());
        assert!(!registry.is_online("usr_a"));
    }

    #[test]
    fn others_excludes_user() {
        let registry = SessionRegistry::new();
        registry.admit(session("usr_a", "alice"));
        registry.admit(session("usr_b", "bob"));
        registry.admit(session("usr_c", "carol"));

        let mut names: Vec<_> = registry
            .others("usr_b")
            .into_iter()
            .map(|s| s.identity.username)
            .collect();
        names.sort();
        assert_eq!(names, ["alice", "carol"]);
    }

    #[test]
    fn concurrent_admits_leave_one_entry_per_user() {
        let registry = Arc::new(SessionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let id = format!("usr_{}", (i * 100 + j) % 50);
                        registry.admit(session(&id, "user"));
                        let _ = registry.lookup(&id);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.len(), 50);
    }
}
