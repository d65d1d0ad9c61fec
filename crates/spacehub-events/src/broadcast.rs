//! In-process publisher backed by a tokio broadcast channel.
//!
//! Every subscriber sees every envelope published after it subscribed.
//! Publishing with no subscribers is not an error: the bus is
//! fire-and-forget and nobody listening is a valid state.

use async_trait::async_trait;
use serde::Serialize;
use spacehub_state::epoch_secs;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{Event, EventPublisher, PublishError, PublishResult, TopicConfig};

const DEFAULT_CAPACITY: usize = 256;

/// A published message as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: u64,
}

pub struct BroadcastPublisher {
    topics: TopicConfig,
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastPublisher {
    pub fn new(topics: TopicConfig) -> Self {
        Self::with_capacity(topics, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(topics: TopicConfig, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { topics, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(TopicConfig::default())
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &Event) -> PublishResult<()> {
        let topic = self.topics.name(event.topic()).to_string();
        let payload = event.payload().map_err(|e| PublishError::Encode {
            topic: topic.clone(),
            message: e.to_string(),
        })?;

        let envelope = Envelope {
            topic,
            payload,
            published_at: epoch_secs(),
        };
        // send() only fails when there are no receivers.
        let receivers = self.tx.send(envelope).unwrap_or(0);
        debug!(
            topic = %self.topics.name(event.topic()),
            space_id = event.space_id(),
            receivers,
            "event published"
        );
        Ok(())
    }
}
