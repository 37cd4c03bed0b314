//! Online/offline announcements. Fire-and-forget: nothing is acknowledged.

use std::sync::Arc;

use super::events::ServerEvent;
use super::fanout::{fan_out, FanoutReport};
use super::registry::SessionRegistry;
use crate::models::user::Identity;

pub struct PresenceBroadcaster {
    registry: Arc<SessionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Tell every other live session that `identity` came online.
    pub fn announce_online(&self, identity: &Identity) -> FanoutReport {
        self.announce(identity, ServerEvent::presence_online(identity))
    }

    /// Tell every other live session that `identity` went offline.
    pub fn announce_offline(&self, identity: &Identity) -> FanoutReport {
        self.announce(identity, ServerEvent::presence_offline(identity))
    }

    fn announce(&self, identity: &Identity, event: ServerEvent) -> FanoutReport {
        let others = self.registry.others(&identity.id);
        let report = fan_out(others.iter().map(|s| &s.handle), &event);
        tracing::debug!(
            user_id = %identity.id,
            event = event.name(),
            delivered = report.delivered,
            "presence announced"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::session::{ConnectionHandle, Session};

    #[test]
    fn announces_to_everyone_but_the_subject() {
        let registry = Arc::new(SessionRegistry::new());
        let (alice_handle, mut alice_rx) = ConnectionHandle::open();
        let (bob_handle, mut bob_rx) = ConnectionHandle::open();
        let alice = Identity::new("usr_a", "alice");
        registry.admit(Session::new(alice.clone(), alice_handle));
        registry.admit(Session::new(Identity::new("usr_b", "bob"), bob_handle));

        let presence = PresenceBroadcaster::new(registry);
        let report = presence.announce_online(&alice);

        assert_eq!(report.delivered, 1);
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::presence_online(&alice));
        assert!(alice_rx.try_recv().is_err());

        presence.announce_offline(&alice);
        assert_eq!(bob_rx.try_recv().unwrap(), ServerEvent::presence_offline(&alice));
    }

    #[test]
    fn announcing_with_nobody_online_is_a_no_op() {
        let presence = PresenceBroadcaster::new(Arc::new(SessionRegistry::new()));
        let report = presence.announce_offline(&Identity::new("usr_a", "alice"));
        assert_eq!(report, FanoutReport::default());
    }
}
