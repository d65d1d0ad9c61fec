//! HashiCorp Vault KV v2 backend.
//!
//! Bundles are read from `GET /v1/{mount}/data/{path}`, written whole with
//! `POST /v1/{mount}/data/{path}`, and removed (all versions) with
//! `DELETE /v1/{mount}/metadata/{path}`. Requests carry the token in the
//! `X-Vault-Token` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{Bundle, SecureConfigStore, VaultError, VaultResult};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Connection settings for a Vault server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base address, e.g. `https://vault.internal:8200`.
    pub address: String,
    pub token: String,
    /// KV v2 mount point.
    #[serde(default = "default_mount")]
    pub mount: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mount() -> String {
    "secret".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Deserialize)]
struct ReadResponse {
    data: ReadData,
}

#[derive(Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Option<Bundle>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    data: &'a Bundle,
}

/// KV v2 client implementing [`SecureConfigStore`].
#[derive(Debug, Clone)]
pub struct VaultKvStore {
    client: Client,
    config: VaultConfig,
}

impl VaultKvStore {
    pub fn new(config: VaultConfig) -> VaultResult<Self> {
        if config.address.is_empty() {
            return Err(VaultError::Config("vault address is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VaultError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, section: &str, path: &str) -> String {
        format!(
            "{}/v1/{}/{section}/{}",
            self.config.address.trim_end_matches('/'),
            self.config.mount,
            path.trim_start_matches('/')
        )
    }

    async fn read_bundle(&self, path: &str) -> VaultResult<Bundle> {
        let resp = self
            .client
            .get(self.url("data", path))
            .header(TOKEN_HEADER, &self.config.token)
            .send()
            .await
            .map_err(unavailable)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Bundle::new());
        }
        let resp = check_status(resp).await?;
        let body: ReadResponse = resp
            .json()
            .await
            .map_err(|e| VaultError::Decode(e.to_string()))?;
        Ok(body.data.data.unwrap_or_default())
    }

    async fn write_bundle(&self, path: &str, bundle: &Bundle) -> VaultResult<()> {
        let resp = self
            .client
            .post(self.url("data", path))
            .header(TOKEN_HEADER, &self.config.token)
            .json(&WriteRequest { data: bundle })
            .send()
            .await
            .map_err(unavailable)?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete_bundle(&self, path: &str) -> VaultResult<()> {
        let resp = self
            .client
            .delete(self.url("metadata", path))
            .header(TOKEN_HEADER, &self.config.token)
            .send()
            .await
            .map_err(unavailable)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl SecureConfigStore for VaultKvStore {
    async fn put(&self, path: &str, name: &str, value: &str) -> VaultResult<()> {
        let mut bundle = self.read_bundle(path).await?;
        bundle.insert(name.to_string(), value.to_string());
        self.write_bundle(path, &bundle).await?;
        debug!(%path, %name, "vault value stored");
        Ok(())
    }

    async fn delete(&self, path: &str, name: &str) -> VaultResult<()> {
        let mut bundle = self.read_bundle(path).await?;
        if bundle.remove(name).is_none() {
            debug!(%path, %name, "vault key already absent");
            return Ok(());
        }
        if bundle.is_empty() {
            self.delete_bundle(path).await?;
            debug!(%path, "vault bundle removed");
        } else {
            self.write_bundle(path, &bundle).await?;
        }
        Ok(())
    }

    async fn get_all(&self, path: &str) -> VaultResult<Bundle> {
        self.read_bundle(path).await
    }
}

fn unavailable(e: reqwest::Error) -> VaultError {
    error!(error = %e, "vault request failed");
    VaultError::Unavailable(e.to_string())
}

async fn check_status(resp: Response) -> VaultResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(VaultError::Unavailable(format!("{status}: {message}")));
    }
    Err(VaultError::Rejected {
        status: status.as_u16(),
        message,
    })
}
