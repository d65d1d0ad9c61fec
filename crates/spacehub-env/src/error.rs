//! Environment error types.

use spacehub_events::PublishError;
use spacehub_lifecycle::LifecycleError;
use spacehub_state::StateError;
use spacehub_vault::VaultError;
use thiserror::Error;

pub type EnvResult<T> = Result<T, EnvError>;

#[derive(Debug, Error)]
pub enum EnvError {
    /// The space or entry is absent, or the caller may not see it.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("concurrent update: {0}")]
    ConcurrentUpdate(String),

    #[error("already exists: {0}")]
    Duplicate(String),

    #[error("too many {kind}s in space: max {max}")]
    LimitExceeded { kind: &'static str, max: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The vault or the state store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("vault error: {0}")]
    Vault(VaultError),

    /// The change was committed but announcing it failed.
    #[error("event publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The change was committed but the app could not be flagged for restart.
    #[error("app restart failed: {0}")]
    Restart(#[from] LifecycleError),

    #[error("state error: {0}")]
    State(StateError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StateError> for EnvError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => EnvError::NotFound(what),
            StateError::ConcurrentUpdate(what) => EnvError::ConcurrentUpdate(what),
            StateError::Duplicate(what) => EnvError::Duplicate(what),
            StateError::LimitExceeded { table, max, .. } => EnvError::LimitExceeded {
                kind: table,
                max,
            },
            e if e.is_unavailable() => EnvError::StoreUnavailable(e.to_string()),
            e => EnvError::State(e),
        }
    }
}

impl From<VaultError> for EnvError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Unavailable(msg) => EnvError::StoreUnavailable(msg),
            e => EnvError::Vault(e),
        }
    }
}
