//! Lifecycle error types.

use spacehub_events::PublishError;
use spacehub_state::{AppStatus, StateError};
use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The space or app is absent, or the caller may not see it.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another writer changed the app since it was read; retryable.
    #[error("concurrent update: {0}")]
    ConcurrentUpdate(String),

    #[error("cannot {operation} while app is {status}")]
    UnmatchedStatus {
        operation: &'static str,
        status: AppStatus,
    },

    #[error("app was restarted {elapsed_secs}s ago, wait {remaining_secs}s more")]
    RestartTooSoon { elapsed_secs: u64, remaining_secs: u64 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The transition was committed but announcing it failed.
    #[error("event publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("state error: {0}")]
    State(StateError),
}

impl From<StateError> for LifecycleError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => LifecycleError::NotFound(what),
            StateError::ConcurrentUpdate(what) => LifecycleError::ConcurrentUpdate(what),
            e if e.is_unavailable() => LifecycleError::StoreUnavailable(e.to_string()),
            e => LifecycleError::State(e),
        }
    }
}
