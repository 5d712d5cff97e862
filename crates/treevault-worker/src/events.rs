//! Broadcast of domain events.

use tokio::sync::broadcast;

use treevault_core::events::{DomainEvent, ResourceEvent};
use treevault_core::types::UserId;

/// Fans committed mutations out to any number of subscribers. Publishing
/// with no subscriber drops the event.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// A bus that buffers up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event caused by `actor`.
    pub fn publish(&self, actor: UserId, payload: ResourceEvent) {
        let event = DomainEvent::new(Some(actor), payload);
        tracing::debug!(event_id = %event.id, payload = ?event.payload, "Domain event");
        let _ = self.tx.send(event);
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}
