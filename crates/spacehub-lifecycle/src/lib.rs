//! spacehub-lifecycle: runtime lifecycle of deployed space apps.
//!
//! A space app moves through its build and serve phases in response to
//! notifications from the build/deploy infrastructure, and through
//! restart, pause and resume in response to users. Every transition is a
//! pure function of the current [`AppStatus`](spacehub_state::AppStatus)
//! (see [`machine`]); the service persists the result with a versioned
//! write, so concurrent notifications for the same app resolve to exactly
//! one winner.
//!
//! # Components
//!
//! - **`machine`**: legal transitions of the status enum
//! - **`permission`**: who may read or change a space
//! - **`service`**: [`SpaceAppLifecycle`], the operations themselves
//! - **`config`**: restart and resume throttling windows

pub mod config;
pub mod error;
pub mod machine;
pub mod permission;
pub mod service;

pub use config::LifecycleConfig;
pub use error::{LifecycleError, LifecycleResult};
pub use permission::{Action, OrgPermissions, PermissionChecker, Role};
pub use service::{AppView, SpaceAppLifecycle};
