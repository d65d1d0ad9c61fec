//! spacehub-env: secrets and variables attached to spaces.
//!
//! Every mutation runs the same ordered pipeline and stops at the first
//! failure:
//!
//! 1. resolve the space (`NotFound`)
//! 2. check permission (denial reported as `NotFound`)
//! 3. on create, enforce the per-space ceiling (`LimitExceeded`)
//! 4. write the vault
//! 5. write the relational row
//! 6. publish "environment changed"
//! 7. flag the space's running app for restart
//!
//! The vault goes first because a vault value without a row is a harmless
//! orphan, while a row without its vault value is a silently wrong
//! configuration. Secret plaintext never reaches the relational store;
//! only its keyed HMAC-SHA256 digest does.

pub mod config;
pub mod entry;
pub mod error;
pub mod manager;
pub mod validate;

pub use config::EnvConfig;
pub use entry::{EnvEntry, EnvKind, EnvUpdate, NewEnvEntry};
pub use error::{EnvError, EnvResult};
pub use manager::EnvConfigManager;
