//! spacehub-state: embedded state store for Spacehub.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for spaces, space apps, secrets and variables.
//!
//! # Architecture
//!
//! Every record is JSON-serialized into a `u64 → &[u8]` table. Records carry
//! a `version` counter and are written through [`StateStore::save`], a
//! conditional update that only lands when the stored version still matches
//! the one the caller read. A mismatch fails with
//! [`StateError::ConcurrentUpdate`]; nothing is retried inside the store.
//!
//! redb serializes write transactions, so the read-compare-write inside a
//! single transaction is atomic without any extra locking.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{NamedInSpace, Record, SpaceScoped, StateStore};
pub use types::*;
