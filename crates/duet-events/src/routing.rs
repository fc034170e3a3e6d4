//! Shared event bus built on top of `tokio::broadcast`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::future::ready;
use futures_util::stream::{self, BoxStream};
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;

use crate::payloads::{AuthEvent, DEFAULT_REPLAY_CAPACITY, EventEnvelope, EventId};

/// Stream handed to subscribers: the replay backlog first, then live events.
pub type EventStream = BoxStream<'static, EventEnvelope>;

/// Cloneable handle to the notification bus. Clones publish onto the same
/// channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus with the provided broadcast and replay capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish `event`, assigning it a sequential identifier.
    pub fn publish(&self, event: AuthEvent) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                let _ = buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        // No receivers is not an error: signals are fire-and-forget.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than `since_id`
    /// ahead of live delivery. Events a lagging subscriber missed are skipped.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog: Vec<EventEnvelope> = since_id.map_or_else(Vec::new, |since| {
            self.lock_buffer()
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });

        let live = BroadcastStream::new(receiver).filter_map(|item| ready(item.ok()));
        stream::iter(backlog).chain(live).boxed()
    }

    /// Snapshot of the replay ring, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<EventEnvelope> {
        self.lock_buffer().iter().cloned().collect()
    }

    /// Number of buffered events of the given kind.
    #[must_use]
    pub fn count(&self, event: AuthEvent) -> usize {
        self.lock_buffer()
            .iter()
            .filter(|item| item.event == event)
            .count()
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_buffer().back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for _ in 0..3 {
            last_id = bus.publish(AuthEvent::LoginRequired);
        }
        let _ = bus.publish(AuthEvent::PermissionDenied);
        assert_eq!(last_id, 3);
        assert_eq!(bus.last_event_id(), Some(4));

        let mut stream = bus.subscribe(Some(2));
        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first.id, 3);
        assert_eq!(second.event, AuthEvent::PermissionDenied);
        assert!(stream.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn live_subscribers_receive_new_events() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let publisher = bus.clone();

        let id = publisher.publish(AuthEvent::GuestAuthenticated);
        let received = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("event delivered")
            .unwrap();
        assert_eq!(received.id, id);
        assert_eq!(received.event.kind(), "isGuestAuthenticated");
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_dropped_events() {
        let bus = EventBus::with_capacity(2);
        let mut stream = bus.subscribe(None);
        for _ in 0..3 {
            let _ = bus.publish(AuthEvent::LoginRequired);
        }

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!((first.id, second.id), (2, 3));
        assert!(stream.next().now_or_never().is_none());
    }

    #[test]
    fn publishing_without_subscribers_is_recorded() {
        let bus = EventBus::with_capacity(2);
        let _ = bus.publish(AuthEvent::LoginRequired);
        let _ = bus.publish(AuthEvent::LoginRequired);
        let _ = bus.publish(AuthEvent::PermissionDenied);

        let recent = bus.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 2);
        assert_eq!(bus.count(AuthEvent::LoginRequired), 1);
        assert_eq!(bus.count(AuthEvent::PermissionDenied), 1);
    }
}
