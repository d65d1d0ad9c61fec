//! spacehubd: the Spacehub daemon.
//!
//! Assembles the Spacehub subsystems into one process:
//! - State store (redb)
//! - Vault (HashiCorp Vault KV v2, or in-memory)
//! - Event publisher (in-process broadcast, drained into the audit log)
//! - Space app lifecycle
//! - Environment manager
//! - Log relay
//! - REST API

pub mod config;
pub mod server;

pub use config::{DaemonConfig, ServerConfig};
pub use server::{Services, run, wire};
