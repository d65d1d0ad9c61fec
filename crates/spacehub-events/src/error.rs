//! Publish error types.

use thiserror::Error;

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode event for {topic}: {message}")]
    Encode { topic: String, message: String },

    /// The bus refused or lost the message.
    #[error("failed to publish to {topic}: {message}")]
    Transport { topic: String, message: String },
}
