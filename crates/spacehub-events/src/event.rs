//! Event payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical destination of an event. Mapped to a concrete topic name by
/// [`TopicConfig`](crate::TopicConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    SpaceAppCreated,
    SpaceAppRestarted,
    SpaceAppPaused,
    SpaceAppResumed,
    SpaceEnvChanged,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::SpaceAppCreated => "space_app_created",
            Topic::SpaceAppRestarted => "space_app_restarted",
            Topic::SpaceAppPaused => "space_app_paused",
            Topic::SpaceAppResumed => "space_app_resumed",
            Topic::SpaceEnvChanged => "space_env_changed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload shared by all space app events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEvent {
    pub space_id: u64,
    pub commit_id: String,
}

/// A secret or variable of a space was created, changed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvChangedEvent {
    pub space_id: u64,
    pub changed_by: String,
}

/// A domain event together with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SpaceAppCreated(AppEvent),
    SpaceAppRestarted(AppEvent),
    SpaceAppPaused(AppEvent),
    SpaceAppResumed(AppEvent),
    SpaceEnvChanged(EnvChangedEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SpaceAppCreated(_) => Topic::SpaceAppCreated,
            Event::SpaceAppRestarted(_) => Topic::SpaceAppRestarted,
            Event::SpaceAppPaused(_) => Topic::SpaceAppPaused,
            Event::SpaceAppResumed(_) => Topic::SpaceAppResumed,
            Event::SpaceEnvChanged(_) => Topic::SpaceEnvChanged,
        }
    }

    pub fn space_id(&self) -> u64 {
        match self {
            Event::SpaceAppCreated(e)
            | Event::SpaceAppRestarted(e)
            | Event::SpaceAppPaused(e)
            | Event::SpaceAppResumed(e) => e.space_id,
            Event::SpaceEnvChanged(e) => e.space_id,
        }
    }

    /// JSON body as it goes on the wire.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Event::SpaceAppCreated(e)
            | Event::SpaceAppRestarted(e)
            | Event::SpaceAppPaused(e)
            | Event::SpaceAppResumed(e) => serde_json::to_value(e),
            Event::SpaceEnvChanged(e) => serde_json::to_value(e),
        }
    }
}
