//! In-process event dispatcher.
//!
//! A bus is open from construction until [`EventBus::close`] is called.
//! Publishing to an open bus never fails for lack of subscribers; publishing
//! to a closed bus returns [`BusError::Closed`]. Closing drops the sender so
//! every subscriber observes the end of the stream.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus '{0}' is closed")]
    Closed(String),
}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
    fn close(&self);
    fn is_open(&self) -> bool;
}

/// Broadcast-backed bus.
pub struct InMemoryBus<E>
where
    E: Event,
{
    name: String,
    capacity: usize,
    sender: RwLock<Option<broadcast::Sender<E>>>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        Self::named("events", capacity)
    }

    pub fn named(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            name: name.into(),
            capacity,
            sender: RwLock::new(Some(sender)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(BusError::Closed(self.name.clone()));
        };
        if sender.send(event).is_err() {
            trace!(bus = %self.name, "event dropped, no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        match self.sender.read().as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(self.capacity).1,
        }
    }

    fn close(&self) {
        if self.sender.write().take().is_some() {
            debug!(bus = %self.name, "event bus closed");
        }
    }

    fn is_open(&self) -> bool {
        self.sender.read().is_some()
    }
}

/// Forward a bus subscription into an mpsc receiver.
///
/// Lagged events are skipped; the forwarder ends when the bus closes or
/// the receiver is dropped.
pub fn to_mpsc<E, B>(bus: &B, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
    B: EventBus<E> + ?Sized,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::<u32>::new(4);
        assert!(bus.publish(1).await.is_ok());
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut rx = bus.subscribe();
        bus.publish(1).await.unwrap();
        bus.publish(2).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn close_ends_streams_and_rejects_publish() {
        let bus = InMemoryBus::<&'static str>::named("run", 8);
        let mut forwarded = to_mpsc(bus.as_ref(), 8);
        bus.publish("hello").await.unwrap();
        assert_eq!(forwarded.recv().await, Some("hello"));

        bus.close();
        assert!(!bus.is_open());
        assert_eq!(forwarded.recv().await, None);
        assert_eq!(
            bus.publish("late").await,
            Err(BusError::Closed("run".into()))
        );

        let mut late = bus.subscribe();
        assert!(late.recv().await.is_err());
    }
}
