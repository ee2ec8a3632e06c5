//! In-process registry source backed by a Tokio broadcast channel.
//!
//! [`ChannelSource::publish`] records the event in the source's view of
//! live services and broadcasts it. Every subscription first replays that
//! view, closed by a `Synced` event, then follows the channel, so a
//! restarted watcher converges on the same table. A subscriber that lags
//! behind the channel is resubscribed and sent a fresh replay, which lets
//! the watcher drop endpoints whose `Removed` event was lost. The stream
//! ends when the source is dropped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::JunctionError;
use crate::registry::{EventSource, EventStream, RegistryEvent};

type Item = Result<RegistryEvent, JunctionError>;

#[derive(Debug)]
pub struct ChannelSource {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    live: BTreeMap<String, RegistryEvent>,
    tx: broadcast::Sender<RegistryEvent>,
}

impl Inner {
    /// Replay of the live set plus a receiver positioned right after it.
    /// Taken under one lock so no event falls between them.
    fn resubscribe(&self) -> (Vec<Item>, broadcast::Receiver<RegistryEvent>) {
        let mut replay: Vec<Item> = self.live.values().cloned().map(Ok).collect();
        replay.push(Ok(RegistryEvent::synced(self.live.keys())));
        (replay, self.tx.subscribe())
    }
}

impl ChannelSource {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Mutex::new(Inner {
                live: BTreeMap::new(),
                tx,
            })),
        }
    }

    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, event: RegistryEvent) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match &event {
            RegistryEvent::Added { endpoint, .. } => {
                inner.live.insert(endpoint.name.clone(), event.clone());
            }
            RegistryEvent::Removed { endpoint_id } => {
                inner.live.remove(endpoint_id);
            }
            RegistryEvent::Synced { endpoint_ids } => {
                inner.live.retain(|name, _| endpoint_ids.contains(name));
            }
        }
        inner.tx.send(event).unwrap_or(0)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn subscribe(&self) -> Result<EventStream, JunctionError> {
        let (replay, rx) = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resubscribe();

        // The stream only holds a weak handle so dropping the source still
        // closes the channel and ends the stream.
        let follow = Follow {
            rx,
            inner: Arc::downgrade(&self.inner),
        };
        let live = stream::unfold(follow, |mut follow| async move {
            let batch = follow.next_batch().await?;
            Some((stream::iter(batch), follow))
        })
        .flatten();

        Ok(stream::iter(replay).chain(live).boxed())
    }
}

struct Follow {
    rx: broadcast::Receiver<RegistryEvent>,
    inner: Weak<Mutex<Inner>>,
}

impl Follow {
    async fn next_batch(&mut self) -> Option<Vec<Item>> {
        match self.rx.recv().await {
            Ok(event) => Some(vec![Ok(event)]),
            Err(RecvError::Lagged(skipped)) => {
                let inner = self.inner.upgrade()?;
                let (replay, rx) = inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .resubscribe();
                self.rx = rx;
                tracing::warn!(skipped, "registry subscriber lagged, replaying live services");

                let mut batch = Vec::with_capacity(replay.len() + 1);
                batch.push(Err(JunctionError::RegistryLagged(skipped)));
                batch.extend(replay);
                Some(batch)
            }
            Err(RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RuleSpec;

    fn added(name: &str) -> RegistryEvent {
        RegistryEvent::added(name, name, 80, vec![RuleSpec::new(&format!("{name}.localhost"), "")])
    }

    #[tokio::test]
    async fn replays_live_services_on_subscribe() {
        let source = ChannelSource::new(8);
        source.publish(added("a"));
        source.publish(added("b"));
        source.publish(RegistryEvent::removed("a"));

        let mut events = source.subscribe().await.unwrap();
        assert_eq!(events.next().await.unwrap().unwrap(), added("b"));
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RegistryEvent::synced(["b"])
        );
    }

    #[tokio::test]
    async fn follows_events_published_after_subscribe() {
        let source = ChannelSource::new(8);
        let mut events = source.subscribe().await.unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RegistryEvent::synced(Vec::<String>::new())
        );

        assert_eq!(source.publish(RegistryEvent::removed("gone")), 1);
        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event, RegistryEvent::removed("gone"));
    }

    #[tokio::test]
    async fn stream_ends_when_source_dropped() {
        let source = ChannelSource::new(8);
        let mut events = source.subscribe().await.unwrap();
        drop(source);
        // Initial (empty) replay, then the end of the stream.
        assert!(events.next().await.unwrap().is_ok());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_error_then_fresh_replay() {
        let source = ChannelSource::new(1);
        let mut events = source.subscribe().await.unwrap();
        events.next().await.unwrap().unwrap();

        source.publish(added("one"));
        source.publish(added("two"));
        source.publish(RegistryEvent::removed("one"));

        assert!(matches!(
            events.next().await.unwrap(),
            Err(JunctionError::RegistryLagged(_))
        ));
        assert_eq!(events.next().await.unwrap().unwrap(), added("two"));
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RegistryEvent::synced(["two"])
        );

        // Buffered events from before the lag are not delivered again.
        source.publish(RegistryEvent::removed("two"));
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            RegistryEvent::removed("two")
        );
    }
}
