//! Per-competition fan-out of attempt lifecycle events to live spectators.

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dto::broadcast::AttemptUpdate;

/// Handle returned by [`BroadcastHub::subscribe`], used to unregister later.
pub type SubscriberId = Uuid;

/// Events a spectator connection may have queued before it is dropped.
pub const SPECTATOR_QUEUE: usize = 64;

/// Delivery to a subscriber failed; the hub drops it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone.
    #[error("subscriber sink closed")]
    Closed,
    /// The subscriber stopped draining its queue.
    #[error("subscriber queue full")]
    Lagging,
}

/// Transport-agnostic destination for serialized events.
pub trait EventSink: Send + Sync {
    /// Push one serialized event. Must not block.
    fn deliver(&self, payload: &str) -> Result<(), SinkError>;
}

impl EventSink for mpsc::Sender<String> {
    fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        self.try_send(payload.to_owned()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SinkError::Lagging,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

impl EventSink for mpsc::UnboundedSender<String> {
    fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        self.send(payload.to_owned()).map_err(|_| SinkError::Closed)
    }
}

type Subscribers = IndexMap<SubscriberId, Arc<dyn EventSink>>;
type Registry = Mutex<HashMap<String, Subscribers>>;

/// Producer and registration side of the hub. Cheap to clone.
#[derive(Clone)]
pub struct BroadcastHub {
    ingress: mpsc::UnboundedSender<AttemptUpdate>,
    registry: Arc<Registry>,
}

/// Single consumer draining the hub's ingress; run it on its own task.
pub struct BroadcastDispatcher {
    ingress: mpsc::UnboundedReceiver<AttemptUpdate>,
    registry: Arc<Registry>,
}

impl BroadcastHub {
    /// Build a hub and the dispatcher that must be spawned to deliver its events.
    pub fn new() -> (Self, BroadcastDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(HashMap::new()));
        (
            Self {
                ingress: tx,
                registry: registry.clone(),
            },
            BroadcastDispatcher {
                ingress: rx,
                registry,
            },
        )
    }

    /// Enqueue an event without waiting for delivery.
    pub fn publish(&self, event: AttemptUpdate) {
        if let Err(err) = self.ingress.send(event) {
            warn!(
                competition_id = %err.0.competition_id,
                "broadcast dispatcher stopped; dropping event"
            );
        }
    }

    /// Register `sink` for every future event of `competition_id`.
    pub async fn subscribe(
        &self,
        competition_id: &str,
        sink: Arc<dyn EventSink>,
    ) -> SubscriberId {
        let id = Uuid::new_v4();
        let mut registry = self.registry.lock().await;
        registry
            .entry(competition_id.to_owned())
            .or_default()
            .insert(id, sink);
        info!(competition_id, subscriber_id = %id, "spectator subscribed");
        id
    }

    /// Remove a subscriber; returns whether it was still registered.
    pub async fn unsubscribe(&self, competition_id: &str, id: SubscriberId) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(subscribers) = registry.get_mut(competition_id) else {
            return false;
        };
        let removed = subscribers.shift_remove(&id).is_some();
        if subscribers.is_empty() {
            registry.remove(competition_id);
        }
        if removed {
            info!(competition_id, subscriber_id = %id, "spectator unsubscribed");
        }
        removed
    }

    /// Number of live subscribers for a competition.
    pub async fn subscriber_count(&self, competition_id: &str) -> usize {
        let registry = self.registry.lock().await;
        registry.get(competition_id).map_or(0, |subscribers| subscribers.len())
    }
}

impl BroadcastDispatcher {
    /// Deliver events in production order until every hub handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.ingress.recv().await {
            self.dispatch(&event).await;
        }
        debug!("broadcast ingress closed; dispatcher exiting");
    }

    async fn dispatch(&self, event: &AttemptUpdate) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize attempt update");
                return;
            }
        };

        let mut registry = self.registry.lock().await;
        let Some(subscribers) = registry.get_mut(&event.competition_id) else {
            return;
        };

        subscribers.retain(|id, sink| match sink.deliver(&payload) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    competition_id = %event.competition_id,
                    subscriber_id = %id,
                    error = %err,
                    "dropping spectator after failed delivery"
                );
                false
            }
        });

        if subscribers.is_empty() {
            registry.remove(&event.competition_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        dto::attempt::AttemptSnapshot,
        state::attempt::{Attempt, AttemptKey, PuzzleLevel},
    };

    fn event(competition_id: &str, attempts: u32) -> AttemptUpdate {
        let mut attempt = Attempt::new(
            AttemptKey::first_step(competition_id, "u1", "p1", 0),
            PuzzleLevel::Easy,
            datetime!(2024-03-01 10:00 UTC),
        );
        attempt.attempts = attempts;
        AttemptUpdate::updated(AttemptSnapshot::from(&attempt))
    }

    fn spawn_hub() -> BroadcastHub {
        let (hub, dispatcher) = BroadcastHub::new();
        tokio::spawn(dispatcher.run());
        hub
    }

    async fn next_attempts(rx: &mut mpsc::UnboundedReceiver<String>) -> u64 {
        let payload = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event delivered in time")
            .expect("sink still open");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        value["try"]["attempts"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_production_order() {
        let hub = spawn_hub();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel::<String>();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel::<String>();
        hub.subscribe("c1", Arc::new(tx_a)).await;
        hub.subscribe("c1", Arc::new(tx_b)).await;

        hub.publish(event("c1", 1));
        hub.publish(event("c1", 2));

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(next_attempts(rx).await, 1);
            assert_eq!(next_attempts(rx).await, 2);
        }
    }

    #[tokio::test]
    async fn failed_sink_is_removed_without_blocking_others() {
        let hub = spawn_hub();
        let (broken_tx, broken_rx) = mpsc::unbounded_channel::<String>();
        drop(broken_rx);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        hub.subscribe("c1", Arc::new(broken_tx)).await;
        hub.subscribe("c1", Arc::new(tx)).await;
        assert_eq!(hub.subscriber_count("c1").await, 2);

        hub.publish(event("c1", 1));
        hub.publish(event("c1", 2));
        assert_eq!(next_attempts(&mut rx).await, 1);
        assert_eq!(next_attempts(&mut rx).await, 2);

        assert_eq!(hub.subscriber_count("c1").await, 1);
    }

    #[tokio::test]
    async fn events_stay_within_their_competition() {
        let hub = spawn_hub();
        let (tx_c1, mut rx_c1) = mpsc::unbounded_channel::<String>();
        let (tx_c2, mut rx_c2) = mpsc::unbounded_channel::<String>();
        hub.subscribe("c1", Arc::new(tx_c1)).await;
        hub.subscribe("c2", Arc::new(tx_c2)).await;

        hub.publish(event("c2", 7));
        hub.publish(event("c1", 3));

        assert_eq!(next_attempts(&mut rx_c1).await, 3);
        assert_eq!(next_attempts(&mut rx_c2).await, 7);
        assert!(rx_c1.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscribers_get_no_backlog() {
        let hub = spawn_hub();
        let (early_tx, mut early_rx) = mpsc::unbounded_channel::<String>();
        hub.subscribe("c1", Arc::new(early_tx)).await;
        hub.publish(event("c1", 1));
        assert_eq!(next_attempts(&mut early_rx).await, 1);

        let (late_tx, mut late_rx) = mpsc::unbounded_channel::<String>();
        let late = hub.subscribe("c1", Arc::new(late_tx)).await;
        hub.publish(event("c1", 2));
        assert_eq!(next_attempts(&mut late_rx).await, 2);
        assert_eq!(next_attempts(&mut early_rx).await, 2);

        assert!(hub.unsubscribe("c1", late).await);
        assert!(!hub.unsubscribe("c1", late).await);
        assert_eq!(hub.subscriber_count("c1").await, 1);
    }

    #[tokio::test]
    async fn lagging_spectator_is_dropped() {
        let hub = spawn_hub();
        let (slow_tx, mut slow_rx) = mpsc::channel::<String>(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        hub.subscribe("c1", Arc::new(slow_tx)).await;
        hub.subscribe("c1", Arc::new(tx)).await;

        hub.publish(event("c1", 1));
        hub.publish(event("c1", 2));
        hub.publish(event("c1", 3));
        for expected in 1..=3 {
            assert_eq!(next_attempts(&mut rx).await, expected);
        }

        assert_eq!(hub.subscriber_count("c1").await, 1);
        assert!(slow_rx.recv().await.is_some());
        assert!(slow_rx.recv().await.is_none());
    }
}
