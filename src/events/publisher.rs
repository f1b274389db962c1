use tokio::sync::broadcast;

use super::PublicationEvent;

/// Envelope around a lifecycle event as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: &'static str,
    pub event: PublicationEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Broadcast publisher for lifecycle events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a lifecycle event.
    ///
    /// A broadcast send fails when there are no subscribers; that is
    /// acceptable here, events are advisory.
    pub fn publish(&self, event: PublicationEvent) {
        let envelope = PublishedEvent {
            name: event.name(),
            event,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(envelope);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
