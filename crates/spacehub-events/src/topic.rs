//! Topic name configuration.

use serde::{Deserialize, Serialize};

use crate::event::Topic;

/// Concrete topic names on the message bus. Unset entries keep their
/// default, which is the snake_case name of the [`Topic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub space_app_created: String,
    pub space_app_restarted: String,
    pub space_app_paused: String,
    pub space_app_resumed: String,
    pub space_env_changed: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            space_app_created: Topic::SpaceAppCreated.as_str().to_string(),
            space_app_restarted: Topic::SpaceAppRestarted.as_str().to_string(),
            space_app_paused: Topic::SpaceAppPaused.as_str().to_string(),
            space_app_resumed: Topic::SpaceAppResumed.as_str().to_string(),
            space_env_changed: Topic::SpaceEnvChanged.as_str().to_string(),
        }
    }
}

impl TopicConfig {
    pub fn name(&self, topic: Topic) -> &str {
        match topic {
            Topic::SpaceAppCreated => &self.space_app_created,
            Topic::SpaceAppRestarted => &self.space_app_restarted,
            Topic::SpaceAppPaused => &self.space_app_paused,
            Topic::SpaceAppResumed => &self.space_app_resumed,
            Topic::SpaceEnvChanged => &self.space_env_changed,
        }
    }
}
