//! Secret and variable records as seen by the manager.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use spacehub_state::{Identity, NamedInSpace, SpaceSecret, SpaceVariable};

use crate::error::{EnvError, EnvResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvKind {
    Secret,
    Variable,
}

impl EnvKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKind::Secret => "secret",
            EnvKind::Variable => "variable",
        }
    }

    /// Vault path holding this kind's values for a space.
    pub fn vault_path(&self, space_id: Identity) -> String {
        format!("{}/{space_id}", self.as_str())
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to create a secret or variable.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEnvEntry {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    pub value: String,
}

/// Request to change a secret or variable. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvUpdate {
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// One row of a space's environment listing. Secrets carry no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvEntry {
    pub id: Identity,
    pub kind: EnvKind,
    pub name: String,
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub updated_at: u64,
}

impl From<&SpaceSecret> for EnvEntry {
    fn from(secret: &SpaceSecret) -> Self {
        secret.to_entry()
    }
}

impl From<&SpaceVariable> for EnvEntry {
    fn from(variable: &SpaceVariable) -> Self {
        variable.to_entry()
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Keyed HMAC-SHA256 of secret values, hex encoded.
#[derive(Clone)]
pub struct SecretDigester {
    mac: HmacSha256,
}

impl SecretDigester {
    pub fn new(key: &[u8]) -> EnvResult<Self> {
        let mac = HmacSha256::new_from_slice(key).map_err(|e| EnvError::Config(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn digest(&self, value: &str) -> String {
        hex::encode(self.mac.clone().chain_update(value.as_bytes()).finalize().into_bytes())
    }

    /// Constant-time check of `value` against a stored digest.
    pub fn matches(&self, digest: &str, value: &str) -> bool {
        hex::decode(digest).is_ok_and(|raw| {
            self.mac
                .clone()
                .chain_update(value.as_bytes())
                .verify_slice(&raw)
                .is_ok()
        })
    }
}

/// Behavior shared by secrets and variables.
pub(crate) trait EnvRecord: NamedInSpace + Clone {
    const ENV_KIND: EnvKind;

    fn build(space_id: Identity, entry: &NewEnvEntry, now: u64, digester: &SecretDigester) -> Self;
    fn desc(&self) -> Option<&str>;
    fn set_desc(&mut self, desc: Option<String>);
    fn value_matches(&self, value: &str, digester: &SecretDigester) -> bool;
    fn set_value(&mut self, value: &str, digester: &SecretDigester);
    fn set_updated_at(&mut self, now: u64);
    fn to_entry(&self) -> EnvEntry;
}

impl EnvRecord for SpaceSecret {
    const ENV_KIND: EnvKind = EnvKind::Secret;

    fn build(space_id: Identity, entry: &NewEnvEntry, now: u64, digester: &SecretDigester) -> Self {
        Self {
            id: 0,
            space_id,
            name: entry.name.clone(),
            desc: entry.desc.clone(),
            value_digest: digester.digest(&entry.value),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    fn set_desc(&mut self, desc: Option<String>) {
        self.desc = desc;
    }

    fn value_matches(&self, value: &str, digester: &SecretDigester) -> bool {
        digester.matches(&self.value_digest, value)
    }

    fn set_value(&mut self, value: &str, digester: &SecretDigester) {
        self.value_digest = digester.digest(value);
    }

    fn set_updated_at(&mut self, now: u64) {
        self.updated_at = now;
    }

    fn to_entry(&self) -> EnvEntry {
        EnvEntry {
            id: self.id,
            kind: EnvKind::Secret,
            name: self.name.clone(),
            desc: self.desc.clone(),
            value: None,
            updated_at: self.updated_at,
        }
    }
}

impl EnvRecord for SpaceVariable {
    const ENV_KIND: EnvKind = EnvKind::Variable;

    fn build(space_id: Identity, entry: &NewEnvEntry, now: u64, _: &SecretDigester) -> Self {
        Self {
            id: 0,
            space_id,
            name: entry.name.clone(),
            desc: entry.desc.clone(),
            value: entry.value.clone(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    fn set_desc(&mut self, desc: Option<String>) {
        self.desc = desc;
    }

    fn value_matches(&self, value: &str, _: &SecretDigester) -> bool {
        self.value == value
    }

    fn set_value(&mut self, value: &str, _: &SecretDigester) {
        self.value = value.to_string();
    }

    fn set_updated_at(&mut self, now: u64) {
        self.updated_at = now;
    }

    fn to_entry(&self) -> EnvEntry {
        EnvEntry {
            id: self.id,
            kind: EnvKind::Variable,
            name: self.name.clone(),
            desc: self.desc.clone(),
            value: Some(self.value.clone()),
            updated_at: self.updated_at,
        }
    }
}
