//! Vault error types.

use thiserror::Error;

/// Errors returned by a secure configuration store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault endpoint could not be reached or failed server-side.
    #[error("vault unavailable: {0}")]
    Unavailable(String),

    #[error("vault rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed vault response: {0}")]
    Decode(String),

    #[error("invalid vault configuration: {0}")]
    Config(String),
}

pub type VaultResult<T> = Result<T, VaultError>;
