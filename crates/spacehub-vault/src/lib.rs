//! spacehub-vault: secure storage for space secrets and variables.
//!
//! A vault holds *bundles*: each path maps to a set of named string values
//! (one bundle per space and entry kind). Writes are read-modify-write
//! against the backend: fetch the bundle, merge or drop one key, write it
//! back. Removing the last key deletes the bundle.
//!
//! Concurrent writers to the same path are not serialized here. Each
//! named key ends up with whichever write landed last.
//!
//! # Backends
//!
//! - **`kv`**: HashiCorp Vault KV v2 over HTTP
//! - **`memory`**: in-process map, for tests and standalone mode

pub mod error;
pub mod kv;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

pub use error::{VaultError, VaultResult};
pub use kv::{VaultConfig, VaultKvStore};
pub use memory::MemoryVault;

/// The values stored at one vault path.
pub type Bundle = HashMap<String, String>;

/// Path/key secret vault.
#[async_trait]
pub trait SecureConfigStore: Send + Sync {
    /// Set `name` to `value` in the bundle at `path`, creating the bundle if needed.
    async fn put(&self, path: &str, name: &str, value: &str) -> VaultResult<()>;

    /// Remove `name` from the bundle at `path`; the bundle goes away once empty.
    async fn delete(&self, path: &str, name: &str) -> VaultResult<()>;

    /// The raw bundle at `path` (empty if there is none).
    async fn get_all(&self, path: &str) -> VaultResult<Bundle>;
}
