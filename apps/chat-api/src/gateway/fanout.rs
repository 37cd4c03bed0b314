//! Best-effort delivery of one event to many connections.

use super::events::ServerEvent;
use super::session::ConnectionHandle;

/// Outcome of a fan-out. Failures are informational only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    /// Connection ids whose queue was already closed.
    pub failed: Vec<String>,
}

/// Deliver `event` to every handle. A closed handle never stops delivery to
/// the rest.
pub fn fan_out<'a>(
    targets: impl IntoIterator<Item = &'a ConnectionHandle>,
    event: &ServerEvent,
) -> FanoutReport {
    let mut report = FanoutReport::default();
    for handle in targets {
        match handle.send(event.clone()) {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                tracing::debug!(%err, event = event.name(), "fan-out delivery failed");
                report.failed.push(err.connection_id);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_handle_does_not_block_others() {
        let (a, mut rx_a) = ConnectionHandle::open();
        let (b, rx_b) = ConnectionHandle::open();
        let (c, mut rx_c) = ConnectionHandle::open();
        drop(rx_b);

        let event = ServerEvent::notification("hi");
        let report = fan_out([&a, &b, &c], &event);

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![b.id().to_string()]);
        assert_eq!(rx_a.try_recv().unwrap(), event);
        assert_eq!(rx_c.try_recv().unwrap(), event);
    }
}
