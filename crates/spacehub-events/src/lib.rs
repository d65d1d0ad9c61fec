//! spacehub-events: domain events and their publication.
//!
//! Lifecycle and environment operations announce what they did by
//! publishing an [`Event`] to a named topic. Publication is fire-and-forget
//! from the store's point of view: a failed publish is reported to the
//! caller but never undoes the write that preceded it.
//!
//! # Components
//!
//! - **`event`**: event payloads and the [`Topic`] each one goes to
//! - **`topic`**: configurable topic names
//! - **`broadcast`**: in-process publisher over a tokio broadcast channel

pub mod broadcast;
pub mod error;
pub mod event;
pub mod topic;

use async_trait::async_trait;

pub use broadcast::{BroadcastPublisher, Envelope};
pub use error::{PublishError, PublishResult};
pub use event::{AppEvent, EnvChangedEvent, Event, Topic};
pub use topic::TopicConfig;

/// Sink for domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> PublishResult<()>;
}
