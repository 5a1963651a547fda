//! Broadcast event bus for distributing `ClientEvent` to UI subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use codesense_types::event::ClientEvent;
use tokio::sync::broadcast;

/// Default channel capacity; generous enough for one streamed answer.
pub const DEFAULT_CAPACITY: usize = 256;

/// Multi-consumer bus for client events.
///
/// Cloning the bus clones the sender, so the coordinator, the orchestrator,
/// and the poll task can all publish onto the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
