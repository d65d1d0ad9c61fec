//! Domain types for the Spacehub state store.
//!
//! These types represent the persisted state of spaces, their deployed
//! apps, and the secrets and variables attached to them. All types are
//! serializable to/from JSON for storage in redb tables.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque numeric identity of a stored record.
pub type Identity = u64;

/// Account name of a user or organization.
pub type Account = String;

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Space ──────────────────────────────────────────────────────────

/// Visibility of a space to non-members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// A hosted, runnable project owned by an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Space {
    pub id: Identity,
    /// Account (user or organization) the space belongs to.
    pub owner: Account,
    /// Account that created the space.
    pub created_by: Account,
    pub name: String,
    pub sdk: String,
    pub hardware: String,
    #[serde(default)]
    pub description: String,
    pub visibility: Visibility,
    /// Commit currently checked out for the space.
    #[serde(default)]
    pub commit_id: String,
    pub version: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Space {
    /// A personal space is one whose owner is also its creator.
    pub fn is_personal(&self) -> bool {
        self.owner == self.created_by
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

// ── Space app ──────────────────────────────────────────────────────

/// Natural key of a deployed build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceAppIndex {
    pub space_id: Identity,
    pub commit_id: String,
}

impl SpaceAppIndex {
    pub fn new(space_id: Identity, commit_id: impl Into<String>) -> Self {
        Self {
            space_id,
            commit_id: commit_id.into(),
        }
    }
}

impl fmt::Display for SpaceAppIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.space_id, self.commit_id)
    }
}

/// Build/serve status of a space app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Init,
    Building,
    BuildFailed,
    BuildSuccessful,
    Serving,
    StartFailed,
    Restarted,
    RestartFailed,
    Paused,
    Resuming,
    ResumeFailed,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Init => "init",
            AppStatus::Building => "building",
            AppStatus::BuildFailed => "build_failed",
            AppStatus::BuildSuccessful => "build_successful",
            AppStatus::Serving => "serving",
            AppStatus::StartFailed => "start_failed",
            AppStatus::Restarted => "restarted",
            AppStatus::RestartFailed => "restart_failed",
            AppStatus::Paused => "paused",
            AppStatus::Resuming => "resuming",
            AppStatus::ResumeFailed => "resume_failed",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployed build of a space with its own lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceApp {
    pub id: Identity,
    #[serde(flatten)]
    pub index: SpaceAppIndex,
    pub status: AppStatus,
    pub app_url: Option<String>,
    pub app_log_url: Option<String>,
    pub build_log_url: Option<String>,
    /// Final build output captured when the build finished.
    #[serde(default)]
    pub all_build_log: String,
    /// Unix timestamp of the last forced restart (0 if never).
    #[serde(default)]
    pub restarted_at: u64,
    /// Unix timestamp of the last resume request (0 if never).
    #[serde(default)]
    pub resumed_at: u64,
    pub version: u64,
}

impl SpaceApp {
    /// A fresh app in `Init` status; id and version are assigned on insert.
    pub fn new(index: SpaceAppIndex) -> Self {
        Self {
            id: 0,
            index,
            status: AppStatus::Init,
            app_url: None,
            app_log_url: None,
            build_log_url: None,
            all_build_log: String::new(),
            restarted_at: 0,
            resumed_at: 0,
            version: 0,
        }
    }

    pub fn space_id(&self) -> Identity {
        self.index.space_id
    }
}

// ── Secrets and variables ─────────────────────────────────────────

/// Relational side of a space secret. The plaintext value lives only in
/// the vault; `value_digest` is a keyed HMAC-SHA256 hex digest used for
/// change detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceSecret {
    pub id: Identity,
    pub space_id: Identity,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    pub value_digest: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub version: u64,
}

/// A named configuration value that can be read back directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceVariable {
    pub id: Identity,
    pub space_id: Identity,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    pub value: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub version: u64,
}
