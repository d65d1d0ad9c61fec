//! spacehubd.toml configuration.
//!
//! Every section is optional. A missing `[vault]` section runs the daemon
//! against an in-memory vault, which forgets all values on restart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spacehub_env::EnvConfig;
use spacehub_events::TopicConfig;
use spacehub_lifecycle::{LifecycleConfig, OrgPermissions};
use spacehub_logs::LogRelayConfig;
use spacehub_vault::VaultConfig;

const DEFAULT_PORT: u16 = 8443;
const DEFAULT_DATA_DIR: &str = "/var/lib/spacehub";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub vault: Option<VaultConfig>,
    pub env: EnvConfig,
    pub lifecycle: LifecycleConfig,
    pub logs: LogRelayConfig,
    pub topics: TopicConfig,
    /// Organization → member → role.
    pub permissions: OrgPermissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: DaemonConfig = toml::from_str(content)?;
        config.set_default();
        Ok(config)
    }

    /// Replace zero values with the defaults.
    pub fn set_default(&mut self) {
        if self.server.port == 0 {
            self.server.port = DEFAULT_PORT;
        }
        if self.server.data_dir.as_os_str().is_empty() {
            self.server.data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        }
        self.env.set_default();
        self.lifecycle.set_default();
    }

    /// TOML rendering with credentials masked, for printing.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }

    fn redacted(&self) -> Self {
        fn mask(value: &mut String) {
            if !value.is_empty() {
                *value = REDACTED.to_string();
            }
        }
        let mut config = self.clone();
        if let Some(vault) = config.vault.as_mut() {
            mask(&mut vault.token);
        }
        mask(&mut config.logs.token);
        mask(&mut config.env.secret_digest_key);
        config
    }
}
