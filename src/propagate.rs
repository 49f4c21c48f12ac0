//! Cross-instance invalidation.
//!
//! After any fact mutation an instance publishes an empty event on the
//! invalidation topic. Every instance, the publisher included, answers with a
//! full reload from the authoritative store. Events carry no delta, so
//! duplicates and reordering are harmless.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::PolicyEngine;
use crate::error::AclError;

/// "Facts changed, reload."
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent;

/// The messaging collaborator.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, event: InvalidationEvent) -> Result<(), AclError>;

    fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<InvalidationEvent>, AclError>;
}

/// In-process broker on `tokio::sync::broadcast`, one channel per topic.
pub struct BroadcastBroker {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<InvalidationEvent>>>,
    failing: AtomicBool,
}

impl BroadcastBroker {
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        BroadcastBroker {
            capacity: capacity.max(1),
            topics: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent publish fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn sender(&self, topic: &str) -> Result<broadcast::Sender<InvalidationEvent>, AclError> {
        if let Some(sender) = self.topics.read()?.get(topic) {
            return Ok(sender.clone());
        }
        let mut topics = self.topics.write()?;
        Ok(topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone())
    }
}

impl Default for BroadcastBroker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl Broker for BroadcastBroker {
    async fn publish(&self, topic: &str, event: InvalidationEvent) -> Result<(), AclError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AclError::Broker(format!("cannot publish to '{topic}'")));
        }
        // No subscribers is not an error.
        let _ = self.sender(topic)?.send(event);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<InvalidationEvent>, AclError> {
        Ok(self.sender(topic)?.subscribe())
    }
}

#[derive(Clone)]
pub struct PolicyChangePropagator {
    broker: Arc<dyn Broker>,
    topic: String,
}

impl PolicyChangePropagator {
    pub fn new<T: Into<String>>(broker: Arc<dyn Broker>, topic: T) -> Self {
        PolicyChangePropagator {
            broker,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish an invalidation. Failure is logged and reported as `false`;
    /// the periodic reload covers the missed event.
    pub async fn notify(&self) -> bool {
        match self.broker.publish(&self.topic, InvalidationEvent).await {
            Ok(()) => {
                debug!(event = "Invalidation", phase = "Published", topic = %self.topic);
                true
            }
            Err(e) => {
                error!(event = "Invalidation", phase = "PublishFailed", topic = %self.topic, error = %e);
                false
            }
        }
    }

    /// Subscribe now and reload `engine` on every event until `cancel` fires
    /// or the topic closes.
    pub fn spawn_listener(
        &self,
        engine: PolicyEngine,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, AclError> {
        let mut events = self.broker.subscribe(&self.topic)?;
        let topic = self.topic.clone();
        info!(event = "Invalidation", phase = "Listening", topic = %topic);

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(InvalidationEvent) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(event = "Invalidation", phase = "Lagged", topic = %topic, skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
                if let Err(e) = engine.load_full().await {
                    warn!(event = "Invalidation", phase = "ReloadFailed", topic = %topic, error = %e);
                }
            }
            debug!(event = "Invalidation", phase = "Stopped", topic = %topic);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = BroadcastBroker::default();
        let mut sub = broker.subscribe("acl.refresh").unwrap();
        broker.publish("acl.refresh", InvalidationEvent).await.unwrap();
        let got = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(got, InvalidationEvent);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let broker = BroadcastBroker::default();
        let mut other = broker.subscribe("other").unwrap();
        broker.publish("acl.refresh", InvalidationEvent).await.unwrap();
        assert!(matches!(
            other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broker = BroadcastBroker::default();
        assert!(broker.publish("nobody", InvalidationEvent).await.is_ok());
    }

    #[tokio::test]
    async fn test_notify_reports_failure_without_error() {
        let broker = Arc::new(BroadcastBroker::default());
        let propagator = PolicyChangePropagator::new(broker.clone(), "acl.refresh");
        assert!(propagator.notify().await);
        broker.set_failing(true);
        assert!(!propagator.notify().await);
    }
}
