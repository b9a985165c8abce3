//! Subscriptions: publishing committed mutation events, and delivering them to subscribers.
//!
//! The executor hands the events of every committed write to a [`SubscriptionsEngine`]. The
//! engine may be shared between many instances of the library (for example through a message
//! broker); the [`BroadcastEngine`] keeps everything in process. Events coming back out of the
//! engine are matched against every registered subscriber by [`fanout::SubscriptionFanout`].
use std::fmt::Debug;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

pub(crate) mod event;
pub(crate) mod fanout;

pub use event::MutationEvent;
pub use event::RelationshipEnd;

pub use crate::schema::naming::EventKind;

/// Transport of mutation events between the instances of the library.
#[async_trait]
pub trait SubscriptionsEngine: Send + Sync + Debug {
    async fn publish(&self, event: MutationEvent);

    /// Every event published from now on, in publication order.
    fn subscribe(&self) -> BoxStream<'static, MutationEvent>;
}

const DEFAULT_CAPACITY: usize = 256;

/// An in process engine over a broadcast channel. A receiver lagging by more than the capacity
/// of the channel misses events.
#[derive(Debug, Clone)]
pub struct BroadcastEngine {
    sender: broadcast::Sender<MutationEvent>,
}

impl BroadcastEngine {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for BroadcastEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl SubscriptionsEngine for BroadcastEngine {
    async fn publish(&self, event: MutationEvent) {
        // No receiver is not an error: nobody is listening yet.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> BoxStream<'static, MutationEvent> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Some(event),
                    Err(error) => {
                        debug!(%error, "subscription receiver lagged behind");
                        None
                    }
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::utils::generated_name;

    fn created(id: &str) -> MutationEvent {
        MutationEvent::Node {
            event: EventKind::Created,
            id: id.to_owned(),
            type_name: generated_name("Movie"),
            old: None,
            new: Some(Map::new()),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn broadcast_delivers_in_publication_order() {
        let engine = BroadcastEngine::default();
        let mut stream = engine.subscribe();
        engine.publish(created("1")).await;
        engine.publish(created("2")).await;
        assert_eq!(stream.next().await, Some(created("1")));
        assert_eq!(stream.next().await, Some(created("2")));
    }

    #[tokio::test]
    async fn publishing_without_receivers_is_fine() {
        let engine = BroadcastEngine::new(1);
        engine.publish(created("1")).await;
        let mut stream = engine.subscribe();
        engine.publish(created("2")).await;
        assert_eq!(stream.next().await, Some(created("2")));
    }
}
