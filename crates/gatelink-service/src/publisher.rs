//! Fan-out of status, fault and error events to subscribers.
//!
//! Each subscriber owns three bounded queues. Delivery never waits: a full
//! queue drops the value for that subscriber and counts the drop, so one
//! stalled consumer cannot hold up the poll loop. The newest status and fault
//! are cached and can be read at any time, which is how a consumer that fell
//! behind recovers the current state.

use chrono::{DateTime, Utc};
use gatelink_core::Error;
use gatelink_protocol::{GateFaultResponse, GateStatusResponse};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Receiving ends handed to a subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub statuses: mpsc::Receiver<GateStatusResponse>,
    pub faults: mpsc::Receiver<GateFaultResponse>,
    pub errors: mpsc::Receiver<Arc<Error>>,
}

/// A cached value and when it was published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<T> {
    pub value: T,
    pub published_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    fn now(value: T) -> Self {
        Self {
            value,
            published_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
struct Listener {
    statuses: mpsc::Sender<GateStatusResponse>,
    faults: mpsc::Sender<GateFaultResponse>,
    errors: mpsc::Sender<Arc<Error>>,
}

/// Subscriber registry and last-value cache.
#[derive(Debug)]
pub struct Publisher {
    listeners: RwLock<HashMap<Uuid, Listener>>,
    capacity: usize,
    last_status: RwLock<Option<Snapshot<GateStatusResponse>>>,
    last_fault: RwLock<Option<Snapshot<GateFaultResponse>>>,
    dropped: AtomicU64,
}

impl Publisher {
    /// Create a publisher whose subscriber queues hold `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            last_status: RwLock::new(None),
            last_fault: RwLock::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let (status_tx, statuses) = mpsc::channel(self.capacity);
        let (fault_tx, faults) = mpsc::channel(self.capacity);
        let (error_tx, errors) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();

        let mut listeners = self.listeners.write().await;
        listeners.insert(
            id,
            Listener {
                statuses: status_tx,
                faults: fault_tx,
                errors: error_tx,
            },
        );
        debug!(%id, listeners = listeners.len(), "Subscriber added");

        Subscription {
            id,
            statuses,
            faults,
            errors,
        }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.listeners.write().await.remove(&id).is_some();
        if removed {
            debug!(%id, "Subscriber removed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Values dropped because a subscriber queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub async fn last_status(&self) -> Option<Snapshot<GateStatusResponse>> {
        self.last_status.read().await.clone()
    }

    pub async fn last_fault(&self) -> Option<Snapshot<GateFaultResponse>> {
        self.last_fault.read().await.clone()
    }

    pub async fn publish_status(&self, status: &GateStatusResponse) {
        *self.last_status.write().await = Some(Snapshot::now(status.clone()));
        self.fan_out("status", status, |l| &l.statuses).await;
    }

    pub async fn publish_fault(&self, fault: &GateFaultResponse) {
        *self.last_fault.write().await = Some(Snapshot::now(fault.clone()));
        self.fan_out("fault", fault, |l| &l.faults).await;
    }

    pub async fn publish_error(&self, error: Arc<Error>) {
        self.fan_out("error", &error, |l| &l.errors).await;
    }

    async fn fan_out<T, F>(&self, kind: &'static str, value: &T, sink: F)
    where
        T: Clone,
        F: Fn(&Listener) -> &mpsc::Sender<T>,
    {
        let mut closed = Vec::new();
        {
            let listeners = self.listeners.read().await;
            for (id, listener) in listeners.iter() {
                match sink(listener).try_send(value.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(%id, kind, "Subscriber queue full, value dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut listeners = self.listeners.write().await;
            for id in closed {
                listeners.remove(&id);
                debug!(%id, "Subscriber gone, removed");
            }
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(n: u8) -> GateFaultResponse {
        GateFaultResponse {
            number_of_faults: n,
            fault_codes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_subscriber() {
        let publisher = Publisher::new(4);
        let mut a = publisher.subscribe().await;
        let mut b = publisher.subscribe().await;
        assert_ne!(a.id, b.id);

        publisher.publish_fault(&fault(1)).await;

        assert_eq!(a.faults.recv().await.unwrap().number_of_faults, 1);
        assert_eq!(b.faults.recv().await.unwrap().number_of_faults, 1);
        assert_eq!(publisher.last_fault().await.unwrap().value, fault(1));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let publisher = Publisher::new(1);
        let mut sub = publisher.subscribe().await;

        publisher.publish_fault(&fault(1)).await;
        publisher.publish_fault(&fault(2)).await;

        assert_eq!(publisher.dropped(), 1);
        assert_eq!(sub.faults.recv().await.unwrap().number_of_faults, 1);
        // the cache still has the newest value
        assert_eq!(publisher.last_fault().await.unwrap().value.number_of_faults, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let publisher = Publisher::default();
        let sub = publisher.subscribe().await;

        assert!(publisher.unsubscribe(sub.id).await);
        assert!(!publisher.unsubscribe(sub.id).await);
        assert_eq!(publisher.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let publisher = Publisher::default();
        let sub = publisher.subscribe().await;
        drop(sub);

        publisher.publish_error(Arc::new(Error::LinkClosed)).await;
        assert_eq!(publisher.subscriber_count().await, 0);
        assert_eq!(publisher.dropped(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let publisher = Publisher::default();
        let mut sub = publisher.subscribe().await;

        publisher
            .publish_error(Arc::new(Error::ResponseTimeout { timeout_ms: 500 }))
            .await;

        let error = sub.errors.recv().await.unwrap();
        assert!(matches!(*error, Error::ResponseTimeout { timeout_ms: 500 }));
    }
}
