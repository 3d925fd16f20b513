//! Read-only event stream for external consumers.
//!
//! The web/telemetry backend subscribes here for state banners and audit
//! records. Publishing never blocks: each subscriber has its own unbounded
//! channel, and subscribers that hung up are dropped on the next publish.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;
use serde::Serialize;

use lawn_common::interlock::audit::{AuditEntry, Trigger};
use lawn_common::interlock::motion::MotionCommand;
use lawn_common::interlock::state::InterlockState;
use lawn_common::time::Timestamp;

/// Published interlock event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InterlockEvent {
    StateChanged {
        from: InterlockState,
        to: InterlockState,
        trigger: Trigger,
        at: Timestamp,
    },
    Audit(AuditEntry),
    CommandBlocked {
        command: MotionCommand,
        state: InterlockState,
        reason: &'static str,
    },
    AcknowledgeRejected {
        operator: String,
        state: InterlockState,
        reason: &'static str,
    },
}

/// Fan-out publisher. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<InterlockEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New subscription receiving every event published from now on.
    pub fn subscribe(&self) -> Receiver<InterlockEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: InterlockEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed() -> InterlockEvent {
        InterlockEvent::StateChanged {
            from: InterlockState::Safe,
            to: InterlockState::Warning,
            trigger: Trigger::Cleared,
            at: Timestamp::from_millis(3),
        }
    }

    #[test]
    fn every_subscriber_receives() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(changed());
        assert_eq!(a.try_recv().unwrap(), changed());
        assert_eq!(b.try_recv().unwrap(), changed());
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(changed());
        assert_eq!(bus.subscriber_count(), 1);
        assert!(a.try_recv().is_ok());
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        EventBus::new().publish(changed());
    }

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_string(&changed()).unwrap();
        assert!(json.contains("\"event\":\"state_changed\""));
        assert!(json.contains("\"to\":\"WARNING\""));
    }
}
