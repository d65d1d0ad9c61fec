//! Log relay error types.

use spacehub_state::AppStatus;
use thiserror::Error;

use crate::relay::LogKind;

pub type LogRelayResult<T> = Result<T, LogRelayError>;

#[derive(Debug, Error)]
pub enum LogRelayError {
    /// The app has not reached the phase that produces this log.
    #[error("{kind} log not available while app is {status}")]
    NotReady { kind: LogKind, status: AppStatus },

    #[error("log source unreachable: {0}")]
    Connect(String),

    #[error("log source returned status {0}")]
    UpstreamStatus(u16),

    /// Reading the upstream failed after the stream had started.
    #[error("log stream interrupted: {0}")]
    Interrupted(String),

    #[error("log source idle for {0}s")]
    Idle(u64),

    #[error("invalid log relay configuration: {0}")]
    Config(String),
}
