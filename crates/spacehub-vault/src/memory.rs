//! In-process vault backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Bundle, SecureConfigStore, VaultError, VaultResult};

/// Vault kept in memory. Can be switched offline to simulate an outage.
#[derive(Debug, Default)]
pub struct MemoryVault {
    bundles: RwLock<HashMap<String, Bundle>>,
    offline: AtomicBool,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of non-empty bundles held.
    pub async fn bundle_count(&self) -> usize {
        self.bundles.read().await.len()
    }

    fn check_online(&self) -> VaultResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("memory vault is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecureConfigStore for MemoryVault {
    async fn put(&self, path: &str, name: &str, value: &str) -> VaultResult<()> {
        self.check_online()?;
        let mut bundles = self.bundles.write().await;
        bundles
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        debug!(%path, %name, "vault value stored");
        Ok(())
    }

    async fn delete(&self, path: &str, name: &str) -> VaultResult<()> {
        self.check_online()?;
        let mut bundles = self.bundles.write().await;
        if let Some(bundle) = bundles.get_mut(path) {
            bundle.remove(name);
            if bundle.is_empty() {
                bundles.remove(path);
                debug!(%path, "vault bundle removed");
            }
        }
        Ok(())
    }

    async fn get_all(&self, path: &str) -> VaultResult<Bundle> {
        self.check_online()?;
        Ok(self
            .bundles
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default())
    }
}
