//! Lifecycle configuration.

use serde::{Deserialize, Serialize};

const DEFAULT_RESTART_OVER_TIME_SECS: u64 = 2 * 60 * 60;
const DEFAULT_RESUME_OVER_TIME_SECS: u64 = 2 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Minimum gap between two user restarts of an app already restarting.
    pub restart_over_time_secs: u64,
    /// Minimum gap before a stuck resume may be requested again.
    pub resume_over_time_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            restart_over_time_secs: DEFAULT_RESTART_OVER_TIME_SECS,
            resume_over_time_secs: DEFAULT_RESUME_OVER_TIME_SECS,
        }
    }
}

impl LifecycleConfig {
    /// Replace zero windows with the defaults.
    pub fn set_default(&mut self) {
        if self.restart_over_time_secs == 0 {
            self.restart_over_time_secs = DEFAULT_RESTART_OVER_TIME_SECS;
        }
        if self.resume_over_time_secs == 0 {
            self.resume_over_time_secs = DEFAULT_RESUME_OVER_TIME_SECS;
        }
    }
}
